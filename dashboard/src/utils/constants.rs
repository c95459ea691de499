/// Scale of the pool's health factor values (1e18 = health factor of 1.0).
pub const HEALTH_FACTOR_DECIMALS: u8 = 18;

/// Scale of the pool's USD-denominated aggregates (borrowing power, total borrows).
pub const USD_VALUE_DECIMALS: u8 = 18;

/// Assumed scale of oracle price answers.
///
/// The oracle's own `decimals()` is deliberately NOT queried: the deployed
/// feeds answer with 8 decimals and the protocol frontend has always assumed
/// so. If a feed with a different exponent were ever registered, USD figures
/// would be wrong by the difference. Known fragility, kept on purpose.
pub const PRICE_FEED_DECIMALS: u8 = 8;

/// Raw health-factor values with more decimal digits than this represent
/// "no debt" and are normalized to the infinite sentinel.
pub const HF_INFINITE_DIGIT_THRESHOLD: usize = 20;

/// Decimal-converted health factors above this are likewise treated as infinite.
pub const HF_INFINITE_VALUE_THRESHOLD: f64 = 1e10;

// Health factor classification tiers.
pub const HF_SAFE_THRESHOLD: f64 = 2.0;
pub const HF_GOOD_THRESHOLD: f64 = 1.5;
pub const HF_RISKY_THRESHOLD: f64 = 1.2;
