use alloy::sol;

// Lending Pool Contract
sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface ILendingPool {
        function supply(address asset, uint256 amount) external payable;
        function withdraw(address asset, uint256 amount) external;
        function borrow(address asset, uint256 amount) external;
        function repay(address asset, uint256 amount) external payable;
        function getHealthFactor(address user) external view returns (uint256);
        function getAccountBorrowingPower(address user)
            external
            view
            returns (uint256 totalBorrowingPower, uint256 totalBorrows);
    }
);

// Lending Pool Core Contract
sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface ILendingPoolCore {
        function userPositions(address user, address asset)
            external
            view
            returns (uint256 suppliedAmount, uint256 borrowedAmount);
    }
);

// Price Oracle Contract
sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface IPriceOracle {
        function getAssetPrice(address asset) external view returns (uint256);
    }
);

// --------- ERC20 ---------
sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
);
