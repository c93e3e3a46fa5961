//! Catalog of readable inner transaction fields.
//!
//! Scalar fields are copied out of the group buffer when the transaction is
//! submitted, so reading them later is always safe. Array fields are fetched
//! lazily by `(group index, field, element)` at the point of access, which is
//! what makes a handle go stale.
//!
//! | Field | Array |
//! |-------|-------|
//! | `ApplicationArgs`, `Accounts`, `Assets`, `Applications` | ✓ |
//! | `Logs`, `ApprovalProgramPages`, `ClearStateProgramPages` | ✓ |
//! | everything else | ✗ |

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! txn_fields {
    ($($(#[$meta:meta])* $name:ident => $array:expr,)*) => {
        /// A field readable from a submitted inner transaction.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum TxnField {
            $($(#[$meta])* $name,)*
        }

        impl TxnField {
            pub const ALL: &'static [TxnField] = &[$(TxnField::$name,)*];

            /// Name used by the VM and in contract source.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(TxnField::$name => stringify!($name),)*
                }
            }

            /// Whether reads of this field are resolved lazily against the group buffer.
            pub fn is_array(&self) -> bool {
                match self {
                    $(TxnField::$name => $array,)*
                }
            }
        }
    };
}

txn_fields! {
    Sender => false,
    Fee => false,
    FirstValid => false,
    LastValid => false,
    Note => false,
    Lease => false,
    Receiver => false,
    Amount => false,
    CloseRemainderTo => false,
    Type => false,
    TypeEnum => false,
    XferAsset => false,
    AssetAmount => false,
    AssetSender => false,
    AssetReceiver => false,
    AssetCloseTo => false,
    GroupIndex => false,
    TxID => false,
    ApplicationID => false,
    OnCompletion => false,
    /// Arguments passed to the called application.
    ApplicationArgs => true,
    NumAppArgs => false,
    Accounts => true,
    NumAccounts => false,
    ApprovalProgram => false,
    ClearStateProgram => false,
    RekeyTo => false,
    ConfigAsset => false,
    ConfigAssetTotal => false,
    ConfigAssetDecimals => false,
    ConfigAssetDefaultFrozen => false,
    ConfigAssetUnitName => false,
    ConfigAssetName => false,
    ConfigAssetURL => false,
    ConfigAssetMetadataHash => false,
    ConfigAssetManager => false,
    ConfigAssetReserve => false,
    ConfigAssetFreeze => false,
    ConfigAssetClawback => false,
    FreezeAsset => false,
    FreezeAssetAccount => false,
    FreezeAssetFrozen => false,
    Assets => true,
    NumAssets => false,
    Applications => true,
    NumApplications => false,
    GlobalNumUint => false,
    GlobalNumByteSlice => false,
    LocalNumUint => false,
    LocalNumByteSlice => false,
    ExtraProgramPages => false,
    Nonparticipation => false,
    /// Log entries emitted by the called application.
    Logs => true,
    NumLogs => false,
    CreatedAssetID => false,
    CreatedApplicationID => false,
    LastLog => false,
    ApprovalProgramPages => true,
    NumApprovalProgramPages => false,
    ClearStateProgramPages => true,
    NumClearStateProgramPages => false,
}

impl fmt::Display for TxnField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opcode lowering should use for a checked array read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ArrayReadOp {
    /// The handle is the last transaction of its group: read the most recent
    /// submission directly.
    Itxnas,
    /// Read from an explicit position in the last submitted group.
    Gitxnas { group_index: usize },
}

impl ArrayReadOp {
    /// Pick the opcode for the handle at `group_index`. Without a known group
    /// size the explicit form is always correct.
    pub fn for_slot(group_index: usize, group_size: Option<usize>) -> Self {
        if group_size == Some(group_index + 1) {
            ArrayReadOp::Itxnas
        } else {
            ArrayReadOp::Gitxnas { group_index }
        }
    }
}

impl fmt::Display for ArrayReadOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayReadOp::Itxnas => f.write_str("itxnas"),
            ArrayReadOp::Gitxnas { group_index } => write!(f, "gitxnas {group_index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_fields_match_vm() {
        let arrays: Vec<_> = TxnField::ALL
            .iter()
            .filter(|f| f.is_array())
            .map(|f| f.as_str())
            .collect();
        assert_eq!(
            arrays,
            [
                "ApplicationArgs",
                "Accounts",
                "Assets",
                "Applications",
                "Logs",
                "ApprovalProgramPages",
                "ClearStateProgramPages",
            ]
        );
    }

    #[test]
    fn last_in_group_reads_most_recent_submission() {
        assert_eq!(ArrayReadOp::for_slot(0, Some(1)), ArrayReadOp::Itxnas);
        assert_eq!(ArrayReadOp::for_slot(1, Some(2)), ArrayReadOp::Itxnas);
        assert_eq!(
            ArrayReadOp::for_slot(0, Some(2)),
            ArrayReadOp::Gitxnas { group_index: 0 }
        );
        assert_eq!(
            ArrayReadOp::for_slot(1, None),
            ArrayReadOp::Gitxnas { group_index: 1 }
        );
    }
}
