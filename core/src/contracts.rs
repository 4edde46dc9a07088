//! Alloy `sol!` bindings for the two fixed-ABI contracts this system consumes
//! but does not implement (§6 "On-chain: AtomicSwap contract" / "On-chain:
//! Registry contract"). Declared inline since no ABI JSON ships with this
//! spec; grounded in the `sol!`-macro usage pattern this workspace's wider
//! reference set uses for contract bindings (load-from-ABI there, inline
//! interface here — the macro supports both forms identically).

use alloy::primitives::{Address, FixedBytes, U256};
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy::providers::{Identity, RootProvider};
use alloy::sol;

sol! {
    #[sol(rpc)]
    interface AtomicSwap {
        event Initiated(bytes32 indexed orderID, bytes32 secretHash, uint256 amount);
        event Redeemed(bytes32 indexed orderID, bytes32 secretHash, bytes32 secret);
        event Refunded(bytes32 indexed orderID);

        function initiate(address token, address redeemer, uint256 timelock, uint256 amount, bytes32 secretHash) external returns (bytes32 orderID);
        function initiateWithSignature(address token, address initiator, address redeemer, uint256 timelock, uint256 amount, bytes32 secretHash, bytes calldata signature) external returns (bytes32 orderID);
        function redeem(bytes32 orderID, bytes32 secret) external;
        function refund(bytes32 orderID) external;
    }
}

sol! {
    #[sol(rpc)]
    interface Registry {
        event UDACreated(address indexed deposit, address indexed token, bytes32 secretHash);
        event NativeUDACreated(address indexed deposit, bytes32 secretHash);

        function getERC20Address(address token, address refundAddress, address redeemer, uint256 timelock, uint256 amount, bytes32 secretHash) external view returns (address);
        function createERC20SwapAddress(address token, address refundAddress, address redeemer, uint256 timelock, uint256 amount, bytes32 secretHash) external returns (address);
        function getNativeAddress(address refundAddress, address redeemer, uint256 timelock, uint256 amount, bytes32 secretHash) external view returns (address);
        function createNativeSwapAddress(address refundAddress, address redeemer, uint256 timelock, uint256 amount, bytes32 secretHash) external payable returns (address);
    }
}

sol! {
    #[sol(rpc)]
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);

        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
    }
}

/// Filler stack shared by every EVM-facing component: gas, nonce, chain-id,
/// blob-gas (alloy's `full` feature enables EIP-4844 support even though this
/// system never sends blob transactions) composed in the same layering alloy
/// itself recommends.
pub type ReadOnlyFillers = JoinFill<Identity, JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>>;
pub type ReadOnlyProvider = FillProvider<ReadOnlyFillers, RootProvider>;

pub type SigningFillers = JoinFill<ReadOnlyFillers, WalletFiller<alloy::network::EthereumWallet>>;
pub type SigningProvider = FillProvider<SigningFillers, RootProvider>;

pub type AtomicSwapInstance<P> = AtomicSwap::AtomicSwapInstance<P>;
pub type RegistryInstance<P> = Registry::RegistryInstance<P>;
pub type Erc20Instance<P> = IERC20::IERC20Instance<P>;

/// Parses an `0x`-prefixed or bare hex address, used at the many call sites
/// across this workspace that take addresses as config/request strings.
pub fn parse_address(s: &str) -> Result<Address, crate::error::CoreError> {
    s.parse()
        .map_err(|e| crate::error::CoreError::InvalidRequest(format!("invalid address {s}: {e}")))
}

pub fn parse_secret_hash(s: &str) -> Result<FixedBytes<32>, crate::error::CoreError> {
    let clean = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(clean)
        .map_err(|e| crate::error::CoreError::InvalidRequest(format!("invalid hex: {e}")))?;
    if bytes.len() != 32 {
        return Err(crate::error::CoreError::InvalidRequest(format!(
            "expected 32-byte secret hash, got {}",
            bytes.len()
        )));
    }
    Ok(FixedBytes::from_slice(&bytes))
}

pub fn amount_to_u256(amount: &crate::types::Amount) -> Result<U256, crate::error::CoreError> {
    U256::from_str_radix(&amount.0.to_string(), 10)
        .map_err(|e| crate::error::CoreError::InvalidRequest(format!("amount out of range: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Amount;

    #[test]
    fn parse_address_accepts_checksummed_and_lowercase() {
        assert!(parse_address("0x000000000000000000000000000000000000aa").is_ok());
        assert!(parse_address("not-an-address").is_err());
    }

    #[test]
    fn parse_secret_hash_requires_exactly_32_bytes() {
        let hash = "0x".to_string() + &"11".repeat(32);
        assert!(parse_secret_hash(&hash).is_ok());
        assert!(parse_secret_hash("0x1234").is_err());
    }

    #[test]
    fn parse_secret_hash_accepts_bare_hex_without_0x_prefix() {
        let hash = "22".repeat(32);
        let parsed = parse_secret_hash(&hash).unwrap();
        assert_eq!(parsed.as_slice(), &[0x22u8; 32]);
    }

    #[test]
    fn amount_to_u256_round_trips_large_values() {
        let amount = Amount::parse("115792089237316195423570985008687907853269984665640564039457584007913129639935").unwrap();
        let u256 = amount_to_u256(&amount).unwrap();
        assert_eq!(u256, U256::MAX);
    }
}
