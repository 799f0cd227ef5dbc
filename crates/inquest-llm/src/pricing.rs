//! Model pricing tables and cost estimation.
//!
//! Amounts are fixed-point: [`Usd`] holds whole nanodollars and every rate is
//! an integer number of nanodollars per token. A list price of `$3.00` per
//! million tokens is therefore stored as `3_000`, and `tokens * rate` is an
//! exact integer product. Summing thousands of steps never drifts.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use inquest_core::Provider;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

const NANOS_PER_DOLLAR: u64 = 1_000_000_000;

/// A non-negative US dollar amount with nanodollar precision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Usd(u64);

impl Usd {
    /// Zero dollars.
    pub const ZERO: Usd = Usd(0);

    /// Build from whole nanodollars.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Build from whole cents.
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents * (NANOS_PER_DOLLAR / 100))
    }

    /// Amount in nanodollars.
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Whether the amount is exactly zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Multiply by an integer, saturating at the maximum amount.
    #[must_use]
    pub const fn times(self, n: u64) -> Self {
        Self(self.0.saturating_mul(n))
    }

    /// Round half-up to `places` decimal places (at most 9).
    #[must_use]
    pub fn round_to(self, places: u32) -> Self {
        let unit = 10u64.pow(9 - places.min(9));
        Self((self.0.saturating_add(unit / 2) / unit) * unit)
    }
}

impl Add for Usd {
    type Output = Usd;

    fn add(self, rhs: Usd) -> Usd {
        Usd(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Usd {
    fn add_assign(&mut self, rhs: Usd) {
        *self = *self + rhs;
    }
}

impl Sum for Usd {
    fn sum<I: Iterator<Item = Usd>>(iter: I) -> Usd {
        iter.fold(Usd::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Usd> for Usd {
    fn sum<I: Iterator<Item = &'a Usd>>(iter: I) -> Usd {
        iter.copied().sum()
    }
}

/// Plain decimal without a currency sign, trailing zeros trimmed but at
/// least two decimals kept (`0.0045`, `1.50`, `12.00`).
impl fmt::Display for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / NANOS_PER_DOLLAR;
        let frac = format!("{:09}", self.0 % NANOS_PER_DOLLAR);
        let trimmed = frac.trim_end_matches('0');
        let keep = trimmed.len().max(2);
        write!(f, "{whole}.{}", &frac[..keep])
    }
}

/// Error parsing a decimal dollar string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid dollar amount `{0}`")]
pub struct ParseUsdError(String);

impl FromStr for Usd {
    type Err = ParseUsdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseUsdError(s.to_owned());
        let raw = s.trim().trim_start_matches('$');
        let (whole, frac) = raw.split_once('.').unwrap_or((raw, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let frac_nanos: u64 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<9}").parse().map_err(|_| err())?
        };
        whole
            .checked_mul(NANOS_PER_DOLLAR)
            .and_then(|n| n.checked_add(frac_nanos))
            .map(Usd)
            .ok_or_else(err)
    }
}

impl Serialize for Usd {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Usd {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-token rates for one model, in nanodollars per token.
///
/// Numerically equal to milli-dollars per million tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceTier {
    /// Rate for prompt tokens.
    pub input_rate: u64,
    /// Rate for completion tokens.
    pub output_rate: u64,
}

/// Cost of one call, split by direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    /// Cost of prompt tokens.
    pub input: Usd,
    /// Cost of completion tokens.
    pub output: Usd,
    /// `input + output`.
    pub total: Usd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ModelFamily {
    Claude,
    Gpt,
    Gemini,
}

/// Whether a backend serves a model family. No fallthrough arm.
fn serves(provider: Provider, family: ModelFamily) -> bool {
    match provider {
        Provider::Anthropic => family == ModelFamily::Claude,
        Provider::OpenAi => family == ModelFamily::Gpt,
        Provider::Google => family == ModelFamily::Gemini,
        Provider::Bedrock => family == ModelFamily::Claude,
        Provider::Ollama => false,
    }
}

/// Look up the price tier for a `(model, provider)` pair.
///
/// Exact model ids are matched first, then family patterns. Returns `None`
/// for local providers and for pairs the table does not know.
pub fn price_tier(model: &str, provider: Provider) -> Option<PriceTier> {
    let (family, tier) = exact_match(model).or_else(|| pattern_match(model))?;
    serves(provider, family).then_some(tier)
}

/// Estimate the cost of one model call.
///
/// Local providers are always free. An unknown `(model, provider)` pair
/// costs zero instead of failing.
pub fn estimate_cost(input_tokens: u64, output_tokens: u64, model: &str, provider: Provider) -> Usd {
    estimate_cost_breakdown(input_tokens, output_tokens, model, provider).total
}

/// Like [`estimate_cost`] with input and output costs reported separately.
pub fn estimate_cost_breakdown(
    input_tokens: u64,
    output_tokens: u64,
    model: &str,
    provider: Provider,
) -> CostBreakdown {
    if provider.is_local() {
        return CostBreakdown::default();
    }
    let Some(tier) = price_tier(model, provider) else {
        debug!(model, %provider, "no price for model, costing at zero");
        return CostBreakdown::default();
    };
    let input = Usd::from_nanos(input_tokens.saturating_mul(tier.input_rate));
    let output = Usd::from_nanos(output_tokens.saturating_mul(tier.output_rate));
    CostBreakdown {
        input,
        output,
        total: input + output,
    }
}

/// Format a cost for display.
///
/// Uses 3 decimal places under one cent, 2 otherwise.
pub fn format_cost(cost: Usd) -> String {
    let places = if cost < Usd::from_cents(1) { 3 } else { 2 };
    let rounded = cost.round_to(places);
    let whole = rounded.nanos() / NANOS_PER_DOLLAR;
    let frac = format!("{:09}", rounded.nanos() % NANOS_PER_DOLLAR);
    format!("${whole}.{}", &frac[..places as usize])
}

/// Format a token count for display (e.g. `"1.5M"`, `"50K"`, `"500"`).
#[allow(clippy::cast_precision_loss)]
pub fn format_tokens(n: u64) -> String {
    let scaled = |value: f64, suffix: &str| {
        if (value - value.round()).abs() < 0.05 {
            format!("{value:.0}{suffix}")
        } else {
            format!("{value:.1}{suffix}")
        }
    };
    if n >= 1_000_000 {
        scaled(n as f64 / 1_000_000.0, "M")
    } else if n >= 1_000 {
        scaled(n as f64 / 1_000.0, "K")
    } else {
        n.to_string()
    }
}

// ─── Price table ─────────────────────────────────────────────────────────────

/// Tier from list prices in milli-dollars per million tokens.
const fn tier(input_mdpm: u64, output_mdpm: u64) -> PriceTier {
    PriceTier {
        input_rate: input_mdpm,
        output_rate: output_mdpm,
    }
}

fn exact_match(model: &str) -> Option<(ModelFamily, PriceTier)> {
    use ModelFamily::{Claude, Gemini, Gpt};

    Some(match model {
        "claude-opus-4-6" | "claude-opus-4-5" => (Claude, tier(5_000, 25_000)),
        "claude-sonnet-4-5-20250929" | "claude-sonnet-4-5" | "claude-sonnet-4-0-20250514"
        | "claude-sonnet-4" | "claude-3-7-sonnet-20250219" | "claude-3-7-sonnet" => {
            (Claude, tier(3_000, 15_000))
        }
        "claude-haiku-4-5-20251001" | "claude-haiku-4-5" => (Claude, tier(1_000, 5_000)),
        "claude-opus-4-1" | "claude-opus-4" => (Claude, tier(15_000, 75_000)),
        "claude-3-haiku-20240307" | "claude-3-haiku" => (Claude, tier(250, 1_250)),

        "gemini-2.5-pro" | "gemini-2-5-pro" => (Gemini, tier(1_250, 5_000)),
        "gemini-2.5-flash" | "gemini-2-5-flash" => (Gemini, tier(75, 300)),

        "o3" => (Gpt, tier(10_000, 40_000)),
        "o4-mini" => (Gpt, tier(1_100, 4_400)),
        "gpt-4.1" => (Gpt, tier(2_000, 8_000)),
        "gpt-4.1-mini" => (Gpt, tier(400, 1_600)),
        "gpt-4.1-nano" => (Gpt, tier(100, 400)),
        "gpt-4o" => (Gpt, tier(2_500, 10_000)),
        "gpt-4o-mini" => (Gpt, tier(150, 600)),

        _ => return None,
    })
}

/// Family patterns. Catches dated ids and Bedrock ids such as
/// `anthropic.claude-sonnet-4-5-20250929-v1:0`.
fn pattern_match(model: &str) -> Option<(ModelFamily, PriceTier)> {
    use ModelFamily::{Claude, Gemini, Gpt};

    let m = model.to_lowercase();

    if m.contains("claude") {
        if m.contains("opus-4-6") || m.contains("opus-4-5") {
            return Some((Claude, tier(5_000, 25_000)));
        }
        if m.contains("opus-4") {
            return Some((Claude, tier(15_000, 75_000)));
        }
        if m.contains("sonnet-4") || m.contains("3-7-sonnet") || m.contains("3-5-sonnet") {
            return Some((Claude, tier(3_000, 15_000)));
        }
        if m.contains("haiku-4-5") {
            return Some((Claude, tier(1_000, 5_000)));
        }
        if m.contains("3-haiku") || m.contains("3-5-haiku") {
            return Some((Claude, tier(250, 1_250)));
        }
        return None;
    }

    if m.contains("gemini") {
        if m.contains("pro") {
            return Some((Gemini, tier(1_250, 5_000)));
        }
        if m.contains("flash") {
            return Some((Gemini, tier(75, 300)));
        }
        return None;
    }

    if m.starts_with("o3") {
        return Some((Gpt, tier(10_000, 40_000)));
    }
    if m.starts_with("o4-mini") {
        return Some((Gpt, tier(1_100, 4_400)));
    }
    if m.contains("gpt-4.1-nano") {
        return Some((Gpt, tier(100, 400)));
    }
    if m.contains("gpt-4.1-mini") {
        return Some((Gpt, tier(400, 1_600)));
    }
    if m.contains("gpt-4.1") {
        return Some((Gpt, tier(2_000, 8_000)));
    }
    if m.contains("gpt-4o-mini") {
        return Some((Gpt, tier(150, 600)));
    }
    if m.contains("gpt-4o") {
        return Some((Gpt, tier(2_500, 10_000)));
    }

    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ── Usd ──

    #[test]
    fn usd_display_trims_but_keeps_two_places() {
        assert_eq!(Usd::ZERO.to_string(), "0.00");
        assert_eq!(Usd::from_cents(150).to_string(), "1.50");
        assert_eq!(Usd::from_nanos(4_500_000).to_string(), "0.0045");
        assert_eq!(Usd::from_nanos(1).to_string(), "0.000000001");
    }

    #[test]
    fn usd_parse_accepts_display_output() {
        for amount in [Usd::ZERO, Usd::from_cents(1234), Usd::from_nanos(4_500_000)] {
            assert_eq!(amount.to_string().parse::<Usd>().unwrap(), amount);
        }
        assert_eq!("$2".parse::<Usd>().unwrap(), Usd::from_cents(200));
        assert_eq!(".5".parse::<Usd>().unwrap(), Usd::from_cents(50));
    }

    #[test]
    fn usd_parse_rejects_garbage() {
        for bad in ["", ".", "abc", "1.2.3", "-1", "0.0000000001"] {
            assert!(bad.parse::<Usd>().is_err(), "{bad}");
        }
    }

    #[test]
    fn usd_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Usd::from_nanos(4_500_000)).unwrap();
        assert_eq!(json, r#""0.0045""#);
        let back: Usd = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Usd::from_nanos(4_500_000));
    }

    #[test]
    fn usd_sum_has_no_drift() {
        // 0.1 added ten thousand times in f64 is not 1000.0
        let step = Usd::from_cents(10);
        let total: Usd = std::iter::repeat_n(step, 10_000).sum();
        assert_eq!(total, Usd::from_cents(100_000));
    }

    #[test]
    fn usd_round_to() {
        assert_eq!(Usd::from_nanos(4_500_000).round_to(3), Usd::from_nanos(5_000_000));
        assert_eq!(Usd::from_nanos(4_499_999).round_to(3), Usd::from_nanos(4_000_000));
    }

    // ── estimate_cost ──

    #[test]
    fn zero_tokens_cost_nothing() {
        assert_eq!(estimate_cost(0, 0, "claude-sonnet-4-5", Provider::Anthropic), Usd::ZERO);
    }

    #[test]
    fn local_provider_is_free() {
        assert_eq!(estimate_cost(1_000_000, 1_000_000, "llama3.1", Provider::Ollama), Usd::ZERO);
        // Even when the model id is a priced one
        assert_eq!(estimate_cost(1_000_000, 1_000_000, "gpt-4.1", Provider::Ollama), Usd::ZERO);
    }

    #[test]
    fn unknown_model_is_free() {
        assert_eq!(estimate_cost(5_000, 2_000, "mystery-model", Provider::Anthropic), Usd::ZERO);
    }

    #[test]
    fn mismatched_provider_is_unresolved() {
        assert_eq!(estimate_cost(1_000, 1_000, "gpt-4.1", Provider::Google), Usd::ZERO);
        assert!(price_tier("gpt-4.1", Provider::OpenAi).is_some());
    }

    #[test]
    fn sonnet_price_per_million() {
        // $3/M input, $15/M output
        let cost = estimate_cost(1_000_000, 1_000_000, "claude-sonnet-4-5", Provider::Anthropic);
        assert_eq!(cost, Usd::from_cents(1_800));
    }

    #[test]
    fn breakdown_splits_directions() {
        let b = estimate_cost_breakdown(2_000, 500, "gpt-4.1", Provider::OpenAi);
        assert_eq!(b.input, Usd::from_nanos(4_000_000));
        assert_eq!(b.output, Usd::from_nanos(4_000_000));
        assert_eq!(b.total, b.input + b.output);
    }

    #[test]
    fn bedrock_ids_resolve_through_patterns() {
        let tier = price_tier("anthropic.claude-sonnet-4-5-20250929-v1:0", Provider::Bedrock);
        assert_eq!(tier, Some(PriceTier { input_rate: 3_000, output_rate: 15_000 }));
    }

    #[test]
    fn sub_cent_rates_are_exact() {
        // Gemini Flash input is $0.075/M
        let cost = estimate_cost(1_000_000, 0, "gemini-2.5-flash", Provider::Google);
        assert_eq!(cost, Usd::from_nanos(75_000_000));
    }

    proptest! {
        #[test]
        fn doubling_tokens_doubles_cost(x in 0u64..5_000_000, y in 0u64..5_000_000) {
            for (model, provider) in [
                ("claude-sonnet-4-5", Provider::Anthropic),
                ("gpt-4.1-mini", Provider::OpenAi),
                ("gemini-2.5-flash", Provider::Google),
            ] {
                let single = estimate_cost(x, y, model, provider);
                let double = estimate_cost(2 * x, 2 * y, model, provider);
                prop_assert_eq!(double, single.times(2));
            }
        }

        #[test]
        fn cost_is_additive(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            let split = estimate_cost(a, 0, "o3", Provider::OpenAi)
                + estimate_cost(b, 0, "o3", Provider::OpenAi);
            prop_assert_eq!(split, estimate_cost(a + b, 0, "o3", Provider::OpenAi));
        }
    }

    // ── formatting ──

    #[test]
    fn format_cost_small_and_large() {
        assert_eq!(format_cost(Usd::from_nanos(4_500_000)), "$0.005");
        assert_eq!(format_cost(Usd::from_cents(1_234)), "$12.34");
        assert_eq!(format_cost(Usd::ZERO), "$0.000");
    }

    #[test]
    fn format_tokens_scales() {
        assert_eq!(format_tokens(500), "500");
        assert_eq!(format_tokens(50_000), "50K");
        assert_eq!(format_tokens(1_500_000), "1.5M");
    }
}
