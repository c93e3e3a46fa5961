pub mod cfg_builder;
