//! Centralized Contract Definitions
//!
//! All Solidity contract interfaces the arbitrage engine talks to,
//! defined using alloy's `sol!` macro.
//!
//! Each interface is annotated with `#[sol(rpc)]` to generate
//! contract instance types that can make RPC calls via any alloy Provider.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

use alloy::sol;

// ── Wrapped native asset (WETH-style) ────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IWETH {
        function deposit() external payable;
        function withdraw(uint256 amount) external;
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

// ── Uniswap V3 QuoterV2 ──────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params) external returns (uint256 amountOut, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate);
    }
}

// ── Second venue: V2-style path router (SushiSwap) ───────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV2Router02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
    }
}

// ── MultiDexExecutor (pre-deployed atomic arb contract) ──────────────
//
// One entry point per strategy kind. minProfit is passed as 0 because
// profitability is validated off-chain before invoking.

sol! {
    #[sol(rpc)]
    interface IArbExecutor {
        function owner() external view returns (address);
        function getStats() external view returns (uint256 totalTrades, uint256 successfulTrades, uint256 totalProfit);
        function executeIntraDexArb(address tokenA, address tokenB, uint24 feeIn, uint24 feeOut, uint256 amountIn, uint256 minProfit) external returns (uint256 profit);
        function executeCrossDexArb(address tokenA, address tokenB, uint24 uniFee, bool uniFirst, uint256 amountIn, uint256 minProfit) external returns (uint256 profit);
        function executeTriangularArb(address tokenA, address tokenB, address tokenC, uint24 feeA, uint24 feeB, uint24 feeC, uint256 amountIn, uint256 minProfit) external returns (uint256 profit);
        function withdrawToken(address token) external;
        function withdrawETH() external;
    }
}
