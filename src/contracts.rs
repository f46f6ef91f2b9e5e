//! Minimal token interfaces used to find and classify approvals.

use alloy::sol;

sol! {
    /// The ERC-20 surface read by the scanner. `Approval` shares its signature with ERC-721.
    #[sol(rpc)]
    #[derive(Debug, PartialEq, Eq)]
    interface IERC20 {
        event Approval(address indexed owner, address indexed spender, uint256 value);

        function allowance(address owner, address spender) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }

    /// The ERC-721 surface read by the scanner.
    #[sol(rpc)]
    #[derive(Debug, PartialEq, Eq)]
    interface IERC721 {
        event ApprovalForAll(address indexed owner, address indexed operator, bool approved);

        function name() external view returns (string);
        function isApprovedForAll(address owner, address operator) external view returns (bool);
    }
}
