//! Ledger raw transactions: RLP encoding and signing.
//!
//! # Wire Layout
//! ```text
//! unsigned: rlp[nonce, gas_price, gas_limit, block_limit, to, value, data,
//!               chain_id, group_id, extra_data]
//! signed:   rlp[...unsigned fields, v, r, s]
//! ```
//! `to` is the empty string for contract deployment. The signing digest is
//! the scheme hash of the unsigned encoding; the transaction hash is the
//! scheme hash of the signed encoding.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, Header, EMPTY_STRING_CODE};

use crate::error::{LedgerError, LedgerResult};
use crate::identity::{Identity, SignatureScheme, TransactionSignature};

/// Unsigned ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub block_limit: U256,
    /// Recipient; `None` deploys `data` as contract code.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: u64,
    pub group_id: u32,
    pub extra_data: Bytes,
}

impl RawTransaction {
    fn fields_length(&self) -> usize {
        self.nonce.length()
            + self.gas_price.length()
            + self.gas_limit.length()
            + self.block_limit.length()
            + self.to.map_or(1, |to| to.length())
            + self.value.length()
            + self.data.length()
            + self.chain_id.length()
            + self.group_id.length()
            + self.extra_data.length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        self.block_limit.encode(out);
        match &self.to {
            Some(to) => to.encode(out),
            None => out.put_u8(EMPTY_STRING_CODE),
        }
        self.value.encode(out);
        self.data.encode(out);
        self.chain_id.encode(out);
        self.group_id.encode(out);
        self.extra_data.encode(out);
    }

    fn decode_fields(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        Ok(Self {
            nonce: U256::decode(buf)?,
            gas_price: U256::decode(buf)?,
            gas_limit: U256::decode(buf)?,
            block_limit: U256::decode(buf)?,
            to: decode_recipient(buf)?,
            value: U256::decode(buf)?,
            data: Bytes::decode(buf)?,
            chain_id: u64::decode(buf)?,
            group_id: u32::decode(buf)?,
            extra_data: Bytes::decode(buf)?,
        })
    }

    /// RLP encoding of the unsigned transaction.
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let payload_length = self.fields_length();
        let mut out = Vec::with_capacity(payload_length + 4);
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_fields(&mut out);
        out
    }

    /// Digest signed under `scheme`.
    pub fn signing_hash(&self, scheme: SignatureScheme) -> TxHash {
        scheme.hash(&self.encode_unsigned())
    }

    /// Sign with `identity` under its own scheme.
    pub async fn sign(self, identity: &Identity) -> LedgerResult<SignedTransaction> {
        let hash = self.signing_hash(identity.scheme());
        let signature = identity.sign_hash(hash).await?;
        Ok(SignedTransaction {
            raw: self,
            signature,
        })
    }
}

fn decode_recipient(buf: &mut &[u8]) -> alloy_rlp::Result<Option<Address>> {
    match buf.first() {
        Some(&EMPTY_STRING_CODE) => {
            *buf = &buf[1..];
            Ok(None)
        }
        _ => Address::decode(buf).map(Some),
    }
}

/// Raw transaction plus its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    raw: RawTransaction,
    signature: TransactionSignature,
}

impl SignedTransaction {
    pub fn raw(&self) -> &RawTransaction {
        &self.raw
    }

    pub fn signature(&self) -> &TransactionSignature {
        &self.signature
    }

    pub fn nonce(&self) -> U256 {
        self.raw.nonce
    }

    pub fn chain_id(&self) -> u64 {
        self.raw.chain_id
    }

    pub fn group_id(&self) -> u32 {
        self.raw.group_id
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.signature.scheme()
    }

    /// RLP encoding sent to the node.
    pub fn encode(&self) -> Vec<u8> {
        let v = self.signature.v_bytes();
        let r = self.signature.r();
        let s = self.signature.s();

        let payload_length = self.raw.fields_length() + v.as_slice().length() + r.length() + s.length();
        let mut out = Vec::with_capacity(payload_length + 4);
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.raw.encode_fields(&mut out);
        v.as_slice().encode(&mut out);
        r.encode(&mut out);
        s.encode(&mut out);
        out
    }

    /// Decode a signed transaction produced under `scheme`.
    pub fn decode(bytes: &[u8], scheme: SignatureScheme) -> LedgerResult<Self> {
        let malformed = |e: alloy_rlp::Error| {
            LedgerError::Protocol(format!("malformed signed transaction: {}", e))
        };

        let mut buf = bytes;
        let header = Header::decode(&mut buf).map_err(malformed)?;
        if !header.list {
            return Err(malformed(alloy_rlp::Error::UnexpectedString));
        }
        if buf.len() != header.payload_length {
            return Err(LedgerError::Protocol(format!(
                "signed transaction declares {} payload bytes but carries {}",
                header.payload_length,
                buf.len()
            )));
        }

        let raw = RawTransaction::decode_fields(&mut buf).map_err(malformed)?;
        let v = Bytes::decode(&mut buf).map_err(malformed)?;
        let r = U256::decode(&mut buf).map_err(malformed)?;
        let s = U256::decode(&mut buf).map_err(malformed)?;
        if !buf.is_empty() {
            return Err(LedgerError::Protocol(format!(
                "{} trailing bytes after signature",
                buf.len()
            )));
        }

        let signature = TransactionSignature::from_parts(scheme, &v, r, s)?;
        Ok(Self { raw, signature })
    }

    /// Transaction hash as reported by the node.
    pub fn hash(&self) -> TxHash {
        self.scheme().hash(&self.encode())
    }

    /// Check the signature and return the signer's address.
    pub fn recover_signer(&self) -> LedgerResult<Address> {
        self.signature
            .recover_signer(self.raw.signing_hash(self.scheme()))
    }

    /// True if `identity` produced this signature.
    pub fn verify(&self, identity: &Identity) -> bool {
        self.scheme() == identity.scheme()
            && self.recover_signer().ok() == Some(identity.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::gas::GasPolicy;
    use crate::ledger::types::CHAIN_ID;

    const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn sample(to: Option<Address>) -> RawTransaction {
        let gas = GasPolicy::default();
        RawTransaction {
            nonce: U256::from(42),
            gas_price: gas.price(),
            gas_limit: gas.limit(),
            block_limit: U256::from(600),
            to,
            value: U256::ZERO,
            data: Bytes::from_static(&[0xa9, 0x05, 0x9c, 0xbb]),
            chain_id: CHAIN_ID,
            group_id: 3,
            extra_data: Bytes::new(),
        }
    }

    #[test]
    fn test_unsigned_layout_starts_with_list_header() {
        let encoded = sample(Some(Address::repeat_byte(0x11))).encode_unsigned();
        let mut buf = encoded.as_slice();
        let header = Header::decode(&mut buf).unwrap();
        assert!(header.list);
        assert_eq!(header.payload_length, buf.len());
    }

    #[test]
    fn test_deploy_encodes_empty_recipient() {
        let call = sample(Some(Address::repeat_byte(0x11))).encode_unsigned();
        let deploy = sample(None).encode_unsigned();
        assert_eq!(call.len() - deploy.len(), 20);
    }

    #[tokio::test]
    async fn test_signed_ecdsa_transaction_decodes_and_verifies() {
        let identity = Identity::from_hex(SignatureScheme::Ecdsa, KEY).unwrap();
        let signed = sample(Some(Address::repeat_byte(0x22))).sign(&identity).await.unwrap();

        let decoded = SignedTransaction::decode(&signed.encode(), SignatureScheme::Ecdsa).unwrap();
        assert_eq!(decoded, signed);
        assert_eq!(decoded.chain_id(), 1);
        assert_eq!(decoded.group_id(), 3);
        assert_eq!(decoded.recover_signer().unwrap(), identity.address());
        assert!(decoded.verify(&identity));
        assert_eq!(decoded.hash(), signed.hash());
    }

    #[tokio::test]
    async fn test_signed_sm_transaction_carries_public_key() {
        let identity = Identity::from_hex(SignatureScheme::Sm, KEY).unwrap();
        let signed = sample(None).sign(&identity).await.unwrap();

        let decoded = SignedTransaction::decode(&signed.encode(), SignatureScheme::Sm).unwrap();
        assert!(matches!(
            decoded.signature(),
            TransactionSignature::Sm2 { public_key, .. } if public_key == identity.public_key()
        ));
        assert!(decoded.verify(&identity));
        assert_eq!(decoded.raw().to, None);
    }

    #[tokio::test]
    async fn test_tampered_transaction_fails_verification() {
        let identity = Identity::from_hex(SignatureScheme::Ecdsa, KEY).unwrap();
        let signed = sample(Some(Address::repeat_byte(0x22))).sign(&identity).await.unwrap();

        let mut tampered = signed.clone();
        tampered.raw.group_id = 4;
        assert!(!tampered.verify(&identity));

        let other = Identity::from_hex(SignatureScheme::Ecdsa, &"11".repeat(32)).unwrap();
        assert!(!signed.verify(&other));
    }

    #[test]
    fn test_garbage_is_protocol_error() {
        for bytes in [&[][..], &[0x80][..], &[0xc1, 0x01, 0x02][..]] {
            let err = SignedTransaction::decode(bytes, SignatureScheme::Ecdsa).unwrap_err();
            assert!(matches!(err, LedgerError::Protocol(_)), "{bytes:?}: {err}");
        }
    }
}
