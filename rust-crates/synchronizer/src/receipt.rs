use ethers::types::{
    Log,
    TransactionReceipt,
    TxHash,
};

/// What the reconciler needs from a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub hash: TxHash,
    pub success: bool,
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn success(hash: TxHash, logs: Vec<Log>) -> Self {
        Self {
            hash,
            success: true,
            logs,
        }
    }

    pub fn reverted(hash: TxHash) -> Self {
        Self {
            hash,
            success: false,
            logs: Vec::new(),
        }
    }
}

impl From<TransactionReceipt> for Receipt {
    fn from(receipt: TransactionReceipt) -> Self {
        // pre-byzantium receipts carry no status
        let reverted = matches!(receipt.status, Some(status) if status.is_zero());
        Self {
            hash: receipt.transaction_hash,
            success: !reverted,
            logs: receipt.logs,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use ethers::types::U64;

    use super::*;

    #[test]
    fn from__status_zero_is_a_revert() {
        // given
        let receipt = TransactionReceipt {
            transaction_hash: TxHash::repeat_byte(1),
            status: Some(U64::zero()),
            ..Default::default()
        };

        // when
        let receipt = Receipt::from(receipt);

        // then
        assert!(!receipt.success);
        assert_eq!(receipt.hash, TxHash::repeat_byte(1));
    }

    #[test]
    fn from__status_one_is_a_success() {
        let receipt = Receipt::from(TransactionReceipt {
            status: Some(U64::one()),
            ..Default::default()
        });
        assert!(receipt.success);
    }
}
