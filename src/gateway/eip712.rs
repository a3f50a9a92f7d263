//! EIP-712 typed-data signing and verification for the order and
//! session-permit gateway, built on `ethers-core`'s `eip712` feature plus
//! `sha3`/`hex` for the Keccak hashing EIP-712 requires.

use ethers_core::types::{Address, Signature, H256, U256};
use ethers_core::utils::keccak256;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    pub fn separator(&self) -> H256 {
        const DOMAIN_TYPEHASH: &[u8] =
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
        let encoded = [
            keccak256(DOMAIN_TYPEHASH).to_vec(),
            keccak256(self.name.as_bytes()).to_vec(),
            keccak256(self.version.as_bytes()).to_vec(),
            pad_u256(U256::from(self.chain_id)).to_vec(),
            pad_address(self.verifying_contract).to_vec(),
        ]
        .concat();
        H256(keccak256(encoded))
    }
}

fn pad_u256(value: U256) -> [u8; 32] {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    buf
}

fn pad_address(addr: Address) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[12..].copy_from_slice(addr.as_bytes());
    buf
}

fn digest(domain: &Eip712Domain, struct_hash: H256) -> H256 {
    let mut buf = Vec::with_capacity(2 + 32 + 32);
    buf.extend_from_slice(b"\x19\x01");
    buf.extend_from_slice(domain.separator().as_bytes());
    buf.extend_from_slice(struct_hash.as_bytes());
    H256(keccak256(buf))
}

/// `Order(address trader,bytes32 market,uint8 side,uint256 qty,uint256 price,uint256 deadline,uint256 nonce)`
#[derive(Debug, Clone)]
pub struct OrderTypedMessage {
    pub trader: Address,
    pub market: H256,
    pub side: u8,
    pub qty: U256,
    pub price: U256,
    pub deadline: U256,
    pub nonce: U256,
}

impl OrderTypedMessage {
    const TYPEHASH: &'static [u8] =
        b"Order(address trader,bytes32 market,uint8 side,uint256 qty,uint256 price,uint256 deadline,uint256 nonce)";

    pub fn struct_hash(&self) -> H256 {
        let encoded = [
            keccak256(Self::TYPEHASH).to_vec(),
            pad_address(self.trader).to_vec(),
            self.market.as_bytes().to_vec(),
            pad_u256(U256::from(self.side)).to_vec(),
            pad_u256(self.qty).to_vec(),
            pad_u256(self.price).to_vec(),
            pad_u256(self.deadline).to_vec(),
            pad_u256(self.nonce).to_vec(),
        ]
        .concat();
        H256(keccak256(encoded))
    }

    pub fn digest(&self, domain: &Eip712Domain) -> H256 {
        digest(domain, self.struct_hash())
    }
}

/// `SessionPermit(address trader,bytes32 relayerSetRoot,uint256 expiry,uint256 maxNotionalPerTrade,uint256 maxNotionalPerSession,uint256 methodsBitmap,bytes32 salt,uint256 nonce)`
#[derive(Debug, Clone)]
pub struct SessionPermitTypedMessage {
    pub trader: Address,
    pub relayer_set_root: H256,
    pub expiry: U256,
    pub max_notional_per_trade: U256,
    pub max_notional_per_session: U256,
    pub methods_bitmap: U256,
    pub salt: H256,
    pub nonce: U256,
}

impl SessionPermitTypedMessage {
    const TYPEHASH: &'static [u8] = b"SessionPermit(address trader,bytes32 relayerSetRoot,uint256 expiry,uint256 maxNotionalPerTrade,uint256 maxNotionalPerSession,uint256 methodsBitmap,bytes32 salt,uint256 nonce)";

    pub fn struct_hash(&self) -> H256 {
        let encoded = [
            keccak256(Self::TYPEHASH).to_vec(),
            pad_address(self.trader).to_vec(),
            self.relayer_set_root.as_bytes().to_vec(),
            pad_u256(self.expiry).to_vec(),
            pad_u256(self.max_notional_per_trade).to_vec(),
            pad_u256(self.max_notional_per_session).to_vec(),
            pad_u256(self.methods_bitmap).to_vec(),
            self.salt.as_bytes().to_vec(),
            pad_u256(self.nonce).to_vec(),
        ]
        .concat();
        H256(keccak256(encoded))
    }

    pub fn digest(&self, domain: &Eip712Domain) -> H256 {
        digest(domain, self.struct_hash())
    }

    /// `session_id = H(trader, relayer_set_root, salt)`.
    pub fn session_id(&self) -> H256 {
        let encoded = [
            pad_address(self.trader).to_vec(),
            self.relayer_set_root.as_bytes().to_vec(),
            self.salt.as_bytes().to_vec(),
        ]
        .concat();
        H256(keccak256(encoded))
    }
}

/// `Cancel(address trader,uint256 orderId,uint256 deadline,uint256 nonce)`
#[derive(Debug, Clone)]
pub struct CancelTypedMessage {
    pub trader: Address,
    pub order_id: U256,
    pub deadline: U256,
    pub nonce: U256,
}

impl CancelTypedMessage {
    const TYPEHASH: &'static [u8] = b"Cancel(address trader,uint256 orderId,uint256 deadline,uint256 nonce)";

    pub fn struct_hash(&self) -> H256 {
        let encoded = [
            keccak256(Self::TYPEHASH).to_vec(),
            pad_address(self.trader).to_vec(),
            pad_u256(self.order_id).to_vec(),
            pad_u256(self.deadline).to_vec(),
            pad_u256(self.nonce).to_vec(),
        ]
        .concat();
        H256(keccak256(encoded))
    }

    pub fn digest(&self, domain: &Eip712Domain) -> H256 {
        digest(domain, self.struct_hash())
    }
}

/// `Modify(address trader,uint256 orderId,uint256 newPrice,uint256 newQty,uint256 deadline,uint256 nonce)`
#[derive(Debug, Clone)]
pub struct ModifyTypedMessage {
    pub trader: Address,
    pub order_id: U256,
    pub new_price: U256,
    pub new_qty: U256,
    pub deadline: U256,
    pub nonce: U256,
}

impl ModifyTypedMessage {
    const TYPEHASH: &'static [u8] =
        b"Modify(address trader,uint256 orderId,uint256 newPrice,uint256 newQty,uint256 deadline,uint256 nonce)";

    pub fn struct_hash(&self) -> H256 {
        let encoded = [
            keccak256(Self::TYPEHASH).to_vec(),
            pad_address(self.trader).to_vec(),
            pad_u256(self.order_id).to_vec(),
            pad_u256(self.new_price).to_vec(),
            pad_u256(self.new_qty).to_vec(),
            pad_u256(self.deadline).to_vec(),
            pad_u256(self.nonce).to_vec(),
        ]
        .concat();
        H256(keccak256(encoded))
    }

    pub fn digest(&self, domain: &Eip712Domain) -> H256 {
        digest(domain, self.struct_hash())
    }
}

/// `SessionRevoke(address trader,bytes32 sessionId,uint256 deadline,uint256 nonce)`
#[derive(Debug, Clone)]
pub struct SessionRevokeTypedMessage {
    pub trader: Address,
    pub session_id: H256,
    pub deadline: U256,
    pub nonce: U256,
}

impl SessionRevokeTypedMessage {
    const TYPEHASH: &'static [u8] =
        b"SessionRevoke(address trader,bytes32 sessionId,uint256 deadline,uint256 nonce)";

    pub fn struct_hash(&self) -> H256 {
        let encoded = [
            keccak256(Self::TYPEHASH).to_vec(),
            pad_address(self.trader).to_vec(),
            self.session_id.as_bytes().to_vec(),
            pad_u256(self.deadline).to_vec(),
            pad_u256(self.nonce).to_vec(),
        ]
        .concat();
        H256(keccak256(encoded))
    }

    pub fn digest(&self, domain: &Eip712Domain) -> H256 {
        digest(domain, self.struct_hash())
    }
}

/// Recovers the signer from a 65-byte (r, s, v) hex signature over `digest`,
/// rejecting if it does not match `expected_signer`.
pub fn recover_and_verify(digest: H256, signature_hex: &str, expected_signer: Address) -> Result<(), ()> {
    let sig_bytes = hex::decode(signature_hex.trim_start_matches("0x")).map_err(|_| ())?;
    let signature = Signature::try_from(sig_bytes.as_slice()).map_err(|_| ())?;
    let recovered = signature.recover(digest).map_err(|_| ())?;
    if recovered == expected_signer {
        Ok(())
    } else {
        Err(())
    }
}

/// Deterministic pre-hash for array fields embedded in a typed message:
/// `keccak(abi_packed(array))`, so a wallet can render a fixed-size hash
/// instead of an open-ended array in its signing prompt.
pub fn hash_address_array(addresses: &[Address]) -> H256 {
    let packed: Vec<u8> = addresses.iter().flat_map(|a| a.as_bytes().to_vec()).collect();
    H256(keccak256(packed))
}

pub fn parse_address(s: &str) -> Option<Address> {
    Address::from_str(s).ok()
}
