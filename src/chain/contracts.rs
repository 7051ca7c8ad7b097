//! Contract bindings for everything the relayer talks to on-chain.

use alloy::sol;

sol! {
    /// Faucet contract surface the relayer depends on. Deployed faucets may
    /// carry more; only these selectors are called here.
    #[sol(rpc)]
    interface IFaucet {
        function paused() external view returns (bool);
        function owner() external view returns (address);
        function isAdmin(address account) external view returns (bool);
        function BACKEND() external view returns (address);
        function hasClaimed(address account) external view returns (bool);
        function hasCustomClaimAmount(address account) external view returns (bool);
        function getCustomClaimAmount(address account) external view returns (uint256);
        function setWhitelist(address account, bool status) external;
        function claim(address[] calldata users) external;
        function token() external view returns (address);
        function tokenAddress() external view returns (address);
    }

    /// Factory registry read by the analytics aggregator.
    #[sol(rpc)]
    interface IFaucetFactory {
        struct FactoryTransaction {
            address faucetAddress;
            string transactionType;
            address initiator;
            uint256 amount;
            bool isEther;
            uint256 timestamp;
        }

        function getAllFaucets() external view returns (address[] memory);
        function getAllTransactions() external view returns (FactoryTransaction[] memory);
    }

    #[sol(rpc)]
    interface IERC20Metadata {
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
    }

    /// USDT management contract driven by the sweeper.
    #[sol(rpc)]
    interface IUsdtManager {
        function USDT() external view returns (address);
        function owner() external view returns (address);
        function getUSDTBalance() external view returns (uint256);
        function transferUSDT(address to, uint256 amount) external;
        function transferAllUSDT(address to) external;
    }
}
