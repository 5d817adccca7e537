use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto::{
    public_key_from_hex, verify_signature, Address, CryptoError, DigitalSignature, Wallet,
};

/// Sentinel sender address for system-issued reward transactions
pub const REWARD_SENDER: &str = "0";

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Malformed request: missing field `{0}`")]
    MalformedRequest(&'static str),

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// A signed value transfer, immutable once constructed.
///
/// `tx_hash` covers the canonical encoding of `(sender, recipient, amount)`
/// and is what the sender signs. Reward transactions carry neither a public
/// key nor a signature; their sender is the reserved system address.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address
    pub sender: Address,

    /// Recipient's address
    pub recipient: Address,

    /// Amount being transferred
    pub amount: u64,

    /// Sender's public key (hex); absent on reward transactions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_public_key: Option<String>,

    /// Signature over the transaction hash; absent on reward transactions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<DigitalSignature>,

    /// Hex SHA-256 of the canonical transfer encoding
    pub tx_hash: String,
}

impl Transaction {
    /// Creates and signs a transfer from the sender's wallet
    pub fn new(
        wallet: &Wallet,
        recipient: Address,
        amount: u64,
    ) -> Result<Transaction, TransactionError> {
        if amount == 0 {
            return Err(TransactionError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let sender = wallet.address().clone();
        let tx_hash = Self::hash_fields(&sender, &recipient, amount);
        let digest = hex::decode(&tx_hash)
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;
        let signature = wallet.sign(&digest);

        Ok(Transaction {
            sender,
            recipient,
            amount,
            sender_public_key: Some(wallet.public_key_hex()),
            signature: Some(signature),
            tx_hash,
        })
    }

    /// Creates a system-issued reward transaction crediting the miner
    pub fn new_reward(miner: Address, amount: u64) -> Transaction {
        let sender = Address(REWARD_SENDER.to_string());
        let tx_hash = Self::hash_fields(&sender, &miner, amount);

        Transaction {
            sender,
            recipient: miner,
            amount,
            sender_public_key: None,
            signature: None,
            tx_hash,
        }
    }

    /// Rebuilds a transaction from already-signed request parts.
    ///
    /// The hash is recomputed server-side; a submitted hash is never trusted.
    pub fn from_parts(
        sender: Address,
        recipient: Address,
        amount: u64,
        sender_public_key: String,
        signature: DigitalSignature,
    ) -> Result<Transaction, TransactionError> {
        if amount == 0 {
            return Err(TransactionError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let tx_hash = Self::hash_fields(&sender, &recipient, amount);

        Ok(Transaction {
            sender,
            recipient,
            amount,
            sender_public_key: Some(sender_public_key),
            signature: Some(signature),
            tx_hash,
        })
    }

    /// Canonical transfer hash: hex SHA-256 over (sender, recipient, amount)
    fn hash_fields(sender: &Address, recipient: &Address, amount: u64) -> String {
        let data = serde_json::json!({
            "sender": sender.0,
            "recipient": recipient.0,
            "amount": amount,
        });

        // Canonical encoding of a fixed-shape value cannot fail
        let encoded = serde_json::to_vec(&data).unwrap();
        hex::encode(Sha256::digest(&encoded))
    }

    /// Checks if this is a system-issued reward transaction
    pub fn is_reward(&self) -> bool {
        self.sender.0 == REWARD_SENDER
    }

    /// Verifies the embedded signature against the embedded public key.
    ///
    /// The canonical hash is recomputed; a transaction whose stored hash
    /// disagrees with its fields never verifies. The embedded key must
    /// derive the sender address, so only the address holder can sign a
    /// debit. Malformed keys or signatures verify as `false`.
    pub fn verify(&self) -> bool {
        let (key_hex, signature) = match (&self.sender_public_key, &self.signature) {
            (Some(key), Some(sig)) => (key, sig),
            _ => return false,
        };

        let expected = Self::hash_fields(&self.sender, &self.recipient, self.amount);
        if self.tx_hash != expected {
            return false;
        }

        let public_key = match public_key_from_hex(key_hex) {
            Ok(key) => key,
            Err(_) => return false,
        };

        if Address::from_public_key(&public_key) != self.sender {
            return false;
        }

        let digest = match hex::decode(&self.tx_hash) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        verify_signature(&digest, signature, &public_key)
    }
}

// Pool membership identity is by transfer hash
impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.tx_hash == other.tx_hash
    }
}

impl Eq for Transaction {}

/// A submitted transaction payload with runtime-optional fields.
///
/// Clients sign transfers themselves; the node only ever sees the public
/// half. Every field must be present before the request reaches the pool.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's address
    pub sender_address: Option<String>,

    /// The recipient's address
    pub recipient_address: Option<String>,

    /// The sender's public key (hex)
    pub sender_public_key: Option<String>,

    /// The amount to transfer
    pub amount: Option<u64>,

    /// The signature over the transfer hash (hex)
    pub signature: Option<String>,
}

impl TransactionRequest {
    /// Checks that every field is present, naming the first one missing
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.sender_address.is_none() {
            return Err(TransactionError::MalformedRequest("sender_address"));
        }
        if self.recipient_address.is_none() {
            return Err(TransactionError::MalformedRequest("recipient_address"));
        }
        if self.sender_public_key.is_none() {
            return Err(TransactionError::MalformedRequest("sender_public_key"));
        }
        if self.amount.is_none() {
            return Err(TransactionError::MalformedRequest("amount"));
        }
        if self.signature.is_none() {
            return Err(TransactionError::MalformedRequest("signature"));
        }
        Ok(())
    }

    /// Validates and converts the request into a transaction
    pub fn into_transaction(self) -> Result<Transaction, TransactionError> {
        self.validate()?;

        Transaction::from_parts(
            Address(self.sender_address.unwrap()),
            Address(self.recipient_address.unwrap()),
            self.amount.unwrap(),
            self.sender_public_key.unwrap(),
            DigitalSignature(self.signature.unwrap()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction_verifies() {
        let sender = Wallet::new();
        let recipient = Wallet::new();

        let tx = Transaction::new(&sender, recipient.address().clone(), 10).unwrap();

        assert_eq!(tx.sender, *sender.address());
        assert_eq!(tx.recipient, *recipient.address());
        assert_eq!(tx.amount, 10);
        assert!(!tx.is_reward());
        assert!(tx.verify());
    }

    #[test]
    fn test_zero_amount_is_rejected() {
        let sender = Wallet::new();
        let recipient = Wallet::new();

        let result = Transaction::new(&sender, recipient.address().clone(), 0);
        assert!(matches!(result, Err(TransactionError::InvalidAmount(_))));
    }

    #[test]
    fn test_foreign_key_cannot_debit_another_address() {
        let victim = Wallet::new();
        let attacker = Wallet::new();
        let recipient = Wallet::new();

        // A signature that is genuinely valid over the canonical hash of
        // (victim, recipient, amount), but made with the attacker's key
        let tx_hash = Transaction::hash_fields(victim.address(), recipient.address(), 10);
        let signature = attacker.sign(&hex::decode(&tx_hash).unwrap());

        let forged = Transaction::from_parts(
            victim.address().clone(),
            recipient.address().clone(),
            10,
            attacker.public_key_hex(),
            signature,
        )
        .unwrap();

        // The embedded key does not derive the sender address
        assert!(!forged.verify());
    }

    #[test]
    fn test_tampered_amount_does_not_verify() {
        let sender = Wallet::new();
        let recipient = Wallet::new();

        let mut tx = Transaction::new(&sender, recipient.address().clone(), 10).unwrap();
        tx.amount = 1000;

        assert!(!tx.verify());
    }

    #[test]
    fn test_reward_transaction() {
        let miner = Wallet::new();
        let tx = Transaction::new_reward(miner.address().clone(), 1);

        assert_eq!(tx.sender.0, REWARD_SENDER);
        assert_eq!(tx.recipient, *miner.address());
        assert!(tx.is_reward());
        assert!(tx.signature.is_none());
        assert!(tx.sender_public_key.is_none());
    }

    #[test]
    fn test_pool_identity_is_by_hash() {
        let sender = Wallet::new();
        let recipient = Wallet::new();

        let a = Transaction::new(&sender, recipient.address().clone(), 10).unwrap();
        let b = Transaction::new(&sender, recipient.address().clone(), 10).unwrap();
        let c = Transaction::new(&sender, recipient.address().clone(), 11).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_request_missing_signature_is_malformed() {
        let sender = Wallet::new();
        let recipient = Wallet::new();

        let request = TransactionRequest {
            sender_address: Some(sender.address().0.clone()),
            recipient_address: Some(recipient.address().0.clone()),
            sender_public_key: Some(sender.public_key_hex()),
            amount: Some(5),
            signature: None,
        };

        assert!(matches!(
            request.validate(),
            Err(TransactionError::MalformedRequest("signature"))
        ));
    }

    #[test]
    fn test_request_round_trip() {
        let sender = Wallet::new();
        let recipient = Wallet::new();
        let signed = Transaction::new(&sender, recipient.address().clone(), 42).unwrap();

        let request = TransactionRequest {
            sender_address: Some(signed.sender.0.clone()),
            recipient_address: Some(signed.recipient.0.clone()),
            sender_public_key: signed.sender_public_key.clone(),
            amount: Some(signed.amount),
            signature: signed.signature.clone().map(|s| s.0),
        };

        let rebuilt = request.into_transaction().unwrap();
        assert_eq!(rebuilt, signed);
        assert!(rebuilt.verify());
    }
}
