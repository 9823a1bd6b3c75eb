//! Tiered price resolution.
//!
//! A model with a fixed price is charged that price times the group ratio, regardless of tokens.
//! Every other model is priced per token: the model ratio times [`RATIO_TO_UNIT_PRICE`] gives the
//! prompt price per million tokens, and the completion (and audio) ratios scale that further.
//! The breakdown records every rate in the order it was used, together with where it came from.

use crate::display::fixed;
use crate::errors::{Error, Result};
use crate::pricing::rates::{RateConfig, RateTable};
use bon::Builder;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Converts a dimensionless ratio into a price per million tokens
pub const RATIO_TO_UNIT_PRICE: Decimal = Decimal::from_parts(2, 0, 0, false, 0);

/// Group multiplier applied when the caller names no group
pub const DEFAULT_GROUP_RATIO: Decimal = Decimal::ONE;

/// Model ratio assumed for models missing from the ratio table
pub const DEFAULT_MODEL_RATIO: Decimal = Decimal::from_parts(30, 0, 0, false, 0);

/// Audio ratios are stored with this many fractional digits
pub const AUDIO_RATIO_DIGITS: u32 = 6;

const TOKENS_PER_UNIT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Values used when a rate is missing from its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingDefaults {
    pub model_ratio: Decimal,
}

impl Default for PricingDefaults {
    fn default() -> Self {
        Self {
            model_ratio: DEFAULT_MODEL_RATIO,
        }
    }
}

/// Audio token counts for audio-capable models
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTokens {
    pub input: u64,
    pub completion: u64,
}

/// What to price
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct PriceQuery {
    #[builder(into)]
    pub model: String,
    #[builder(default)]
    #[serde(default)]
    pub input_tokens: u64,
    #[builder(default)]
    #[serde(default)]
    pub completion_tokens: u64,
    /// `None` means [`DEFAULT_GROUP_RATIO`]
    #[serde(default)]
    pub group_ratio: Option<Decimal>,
    #[serde(default)]
    pub audio: Option<AudioTokens>,
}

/// Which branch priced the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    FixedPrice,
    Ratio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceComponent {
    FixedPrice,
    ModelRatio,
    CompletionRatio,
    InputUnitPrice,
    CompletionUnitPrice,
    TextCost,
    AudioRatio,
    AudioCompletionRatio,
    AudioCost,
}

/// Where a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Read from a rate table or supplied by the caller
    Configured,
    /// Missing; a default was substituted
    Defaulted,
    /// Computed from other lines
    Derived,
}

/// A value together with its provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub component: PriceComponent,
    pub value: Decimal,
    pub source: RateSource,
}

impl LineItem {
    fn new(component: PriceComponent, value: Decimal, source: RateSource) -> Self {
        Self { component, value, source }
    }
}

/// Group multiplier actually applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedGroupRatio {
    pub value: Decimal,
    pub source: RateSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceResolution {
    pub model: String,
    pub mode: PricingMode,
    pub group_ratio: AppliedGroupRatio,
    pub total: Decimal,
    /// In computation order
    pub breakdown: Vec<LineItem>,
    pub input_tokens: u64,
    pub completion_tokens: u64,
    pub audio: Option<AudioTokens>,
}

impl PriceResolution {
    /// First breakdown line for a component
    pub fn line(&self, component: PriceComponent) -> Option<&LineItem> {
        self.breakdown.iter().find(|line| line.component == component)
    }

    fn value(&self, component: PriceComponent) -> Decimal {
        self.line(component).map(|line| line.value).unwrap_or_default()
    }

    /// Human-readable derivation, one line per step
    pub fn describe(&self) -> Vec<String> {
        let g = self.group_ratio.value.normalize();
        let total = fixed(self.total, 6);

        if self.mode == PricingMode::FixedPrice {
            return vec![format!(
                "Model price: ${} * group ratio {g} = ${total}",
                fixed(self.value(PriceComponent::FixedPrice), 6)
            )];
        }

        let input_unit = fixed(self.value(PriceComponent::InputUnitPrice), 6);
        let completion_unit = fixed(self.value(PriceComponent::CompletionUnitPrice), 6);
        let mut lines = vec![
            format!("Prompt price: ${input_unit} / 1M tokens"),
            format!("Completion price: ${completion_unit} / 1M tokens"),
        ];

        let mut formula = format!(
            "Prompt {} tokens / 1M tokens * ${input_unit} + Completion {} tokens / 1M tokens * ${completion_unit}",
            self.input_tokens, self.completion_tokens
        );

        if let Some(audio) = self.audio {
            let audio_ratio = self.value(PriceComponent::AudioRatio);
            let audio_completion_ratio = self.value(PriceComponent::AudioCompletionRatio);
            let input_unit_value = self.value(PriceComponent::InputUnitPrice);
            let audio_input_unit = fixed(product(&[input_unit_value, audio_ratio]).unwrap_or_default(), 6);
            let audio_completion_unit = fixed(product(&[input_unit_value, audio_ratio, audio_completion_ratio]).unwrap_or_default(), 6);
            lines.push(format!("Audio prompt price: ${audio_input_unit} / 1M tokens"));
            lines.push(format!("Audio completion price: ${audio_completion_unit} / 1M tokens"));
            formula.push_str(&format!(
                " + Audio prompt {} tokens / 1M tokens * ${audio_input_unit} + Audio completion {} tokens / 1M tokens * ${audio_completion_unit}",
                audio.input, audio.completion
            ));
        }

        formula.push_str(&format!(" * group {g} = ${total}"));
        lines.push(formula);
        lines
    }
}

/// Resolve the price of a query against one rate configuration
#[instrument(skip(rates, defaults), fields(model = %query.model), err)]
pub fn resolve_price(query: &PriceQuery, rates: &RateConfig, defaults: &PricingDefaults) -> Result<PriceResolution> {
    let group_ratio = match query.group_ratio {
        Some(value) => AppliedGroupRatio {
            value,
            source: RateSource::Configured,
        },
        None => AppliedGroupRatio {
            value: DEFAULT_GROUP_RATIO,
            source: RateSource::Defaulted,
        },
    };
    let g = group_ratio.value;
    let overflow = || Error::PriceOverflow {
        model: query.model.clone(),
    };

    let resolution = |mode, total, breakdown| PriceResolution {
        model: query.model.clone(),
        mode,
        group_ratio,
        total,
        breakdown,
        input_tokens: query.input_tokens,
        completion_tokens: query.completion_tokens,
        audio: query.audio,
    };

    if let Some(&price) = rates.fixed_price.get(&query.model) {
        let total = price.checked_mul(g).ok_or_else(overflow)?;
        debug!(%total, "Priced with fixed model price");
        return Ok(resolution(
            PricingMode::FixedPrice,
            total,
            vec![LineItem::new(PriceComponent::FixedPrice, price, RateSource::Configured)],
        ));
    }

    let (model_ratio, model_ratio_source) = lookup(&rates.model_ratio, &query.model, defaults.model_ratio);
    let (completion_ratio, completion_ratio_source) = lookup(&rates.completion_ratio, &query.model, Decimal::ZERO);

    let input_unit = model_ratio.checked_mul(RATIO_TO_UNIT_PRICE).ok_or_else(overflow)?;
    let completion_unit = input_unit.checked_mul(completion_ratio).ok_or_else(overflow)?;

    let text_cost = sum(&[
        product(&[per_million(query.input_tokens), input_unit, g]),
        product(&[per_million(query.completion_tokens), completion_unit, g]),
    ])
    .ok_or_else(overflow)?;

    let mut breakdown = vec![
        LineItem::new(PriceComponent::ModelRatio, model_ratio, model_ratio_source),
        LineItem::new(PriceComponent::CompletionRatio, completion_ratio, completion_ratio_source),
        LineItem::new(PriceComponent::InputUnitPrice, input_unit, RateSource::Derived),
        LineItem::new(PriceComponent::CompletionUnitPrice, completion_unit, RateSource::Derived),
        LineItem::new(PriceComponent::TextCost, text_cost, RateSource::Derived),
    ];

    let mut total = text_cost;

    if let Some(audio) = query.audio {
        let (audio_ratio, audio_ratio_source) = lookup(&rates.audio_ratio, &query.model, Decimal::ZERO);
        let (audio_completion_ratio, audio_completion_source) = lookup(&rates.audio_completion_ratio, &query.model, Decimal::ZERO);
        let audio_ratio = round_audio(audio_ratio);
        let audio_completion_ratio = round_audio(audio_completion_ratio);

        let audio_cost = sum(&[
            product(&[per_million(audio.input), input_unit, audio_ratio, g]),
            product(&[per_million(audio.completion), input_unit, audio_ratio, audio_completion_ratio, g]),
        ])
        .ok_or_else(overflow)?;

        breakdown.push(LineItem::new(PriceComponent::AudioRatio, audio_ratio, audio_ratio_source));
        breakdown.push(LineItem::new(PriceComponent::AudioCompletionRatio, audio_completion_ratio, audio_completion_source));
        breakdown.push(LineItem::new(PriceComponent::AudioCost, audio_cost, RateSource::Derived));

        total = total.checked_add(audio_cost).ok_or_else(overflow)?;
    }

    debug!(%total, "Priced with model ratio");
    Ok(resolution(PricingMode::Ratio, total, breakdown))
}

/// Prompt and completion prices per million tokens for a ratio-priced model, including the group
/// ratio. Shared with the pricing catalog so both surfaces agree.
pub fn unit_prices(model_ratio: Decimal, completion_ratio: Decimal, group_ratio: Decimal) -> Option<(Decimal, Decimal)> {
    let input = product(&[model_ratio, RATIO_TO_UNIT_PRICE, group_ratio])?;
    let completion = product(&[model_ratio, completion_ratio, RATIO_TO_UNIT_PRICE, group_ratio])?;
    Some((input, completion))
}

fn lookup(table: &RateTable, model: &str, default: Decimal) -> (Decimal, RateSource) {
    match table.get(model) {
        Some(&value) => (value, RateSource::Configured),
        None => (default, RateSource::Defaulted),
    }
}

fn round_audio(ratio: Decimal) -> Decimal {
    ratio.round_dp_with_strategy(AUDIO_RATIO_DIGITS, RoundingStrategy::MidpointAwayFromZero)
}

fn per_million(tokens: u64) -> Decimal {
    Decimal::from(tokens) / TOKENS_PER_UNIT
}

fn product(factors: &[Decimal]) -> Option<Decimal> {
    factors.iter().try_fold(Decimal::ONE, |acc, factor| acc.checked_mul(*factor))
}

fn sum(terms: &[Option<Decimal>]) -> Option<Decimal> {
    terms.iter().try_fold(Decimal::ZERO, |acc, term| acc.checked_add((*term)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn rates(json: &str) -> RateConfig {
        RateConfig::from_json(json).unwrap()
    }

    #[test]
    fn test_fixed_price_wins_over_ratio() {
        let rates = rates(r#"{"ModelPrice": {"m": 2}, "ModelRatio": {"m": 100}}"#);
        let query = PriceQuery::builder()
            .model("m")
            .input_tokens(1_000_000)
            .completion_tokens(1_000_000)
            .group_ratio(d("2"))
            .build();

        let resolution = resolve_price(&query, &rates, &PricingDefaults::default()).unwrap();

        assert_eq!(resolution.mode, PricingMode::FixedPrice);
        assert_eq!(resolution.total, d("4"));
        assert_eq!(resolution.breakdown.len(), 1);
        assert_eq!(resolution.breakdown[0].component, PriceComponent::FixedPrice);
        assert_eq!(resolution.group_ratio.source, RateSource::Configured);
    }

    #[test]
    fn test_ratio_arithmetic() {
        let rates = rates(r#"{"ModelRatio": {"m": 0.5}, "CompletionRatio": {"m": 2}}"#);
        let query = PriceQuery::builder()
            .model("m")
            .input_tokens(1_000_000)
            .completion_tokens(500_000)
            .group_ratio(Decimal::ONE)
            .build();

        let resolution = resolve_price(&query, &rates, &PricingDefaults::default()).unwrap();

        assert_eq!(resolution.mode, PricingMode::Ratio);
        assert_eq!(resolution.line(PriceComponent::InputUnitPrice).unwrap().value, d("1.0"));
        assert_eq!(resolution.line(PriceComponent::CompletionUnitPrice).unwrap().value, d("2.0"));
        assert_eq!(resolution.total, d("2.0"));

        let components: Vec<_> = resolution.breakdown.iter().map(|line| line.component).collect();
        assert_eq!(
            components,
            vec![
                PriceComponent::ModelRatio,
                PriceComponent::CompletionRatio,
                PriceComponent::InputUnitPrice,
                PriceComponent::CompletionUnitPrice,
                PriceComponent::TextCost,
            ]
        );
    }

    #[test]
    fn test_missing_rates_are_marked_defaulted() {
        let query = PriceQuery::builder().model("unknown").input_tokens(1_000_000).build();
        let defaults = PricingDefaults { model_ratio: d("15") };

        let resolution = resolve_price(&query, &RateConfig::default(), &defaults).unwrap();

        let model_ratio = resolution.line(PriceComponent::ModelRatio).unwrap();
        assert_eq!(model_ratio.value, d("15"));
        assert_eq!(model_ratio.source, RateSource::Defaulted);
        assert_eq!(resolution.line(PriceComponent::CompletionRatio).unwrap().source, RateSource::Defaulted);
        assert_eq!(resolution.group_ratio.value, DEFAULT_GROUP_RATIO);
        assert_eq!(resolution.group_ratio.source, RateSource::Defaulted);
        assert_eq!(resolution.total, d("30"));
    }

    #[test]
    fn test_configured_zero_ratio_is_not_defaulted() {
        let rates = rates(r#"{"ModelRatio": {"free": 0}}"#);
        let query = PriceQuery::builder().model("free").input_tokens(5_000_000).build();

        let resolution = resolve_price(&query, &rates, &PricingDefaults::default()).unwrap();

        let line = resolution.line(PriceComponent::ModelRatio).unwrap();
        assert_eq!(line.value, Decimal::ZERO);
        assert_eq!(line.source, RateSource::Configured);
        assert_eq!(resolution.total, Decimal::ZERO);
    }

    #[test]
    fn test_audio_cost() {
        let rates = rates(
            r#"{
                "ModelRatio": {"gpt-4o-audio": 1.25},
                "CompletionRatio": {"gpt-4o-audio": 4},
                "AudioRatio": {"gpt-4o-audio": 16.0000004},
                "AudioCompletionRatio": {"gpt-4o-audio": 2}
            }"#,
        );
        let query = PriceQuery::builder()
            .model("gpt-4o-audio")
            .input_tokens(1_000_000)
            .completion_tokens(0)
            .audio(AudioTokens {
                input: 500_000,
                completion: 250_000,
            })
            .build();

        let resolution = resolve_price(&query, &rates, &PricingDefaults::default()).unwrap();

        // input unit 2.5; audio ratio rounds to 16
        assert_eq!(resolution.line(PriceComponent::AudioRatio).unwrap().value, d("16"));
        // text: 1 * 2.5 = 2.5
        // audio: 0.5 * 2.5 * 16 + 0.25 * 2.5 * 16 * 2 = 20 + 20 = 40
        assert_eq!(resolution.line(PriceComponent::AudioCost).unwrap().value, d("40"));
        assert_eq!(resolution.total, d("42.5"));

        let lines = resolution.describe();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2], "Audio prompt price: $40.000000 / 1M tokens");
        assert_eq!(lines[3], "Audio completion price: $80.000000 / 1M tokens");
        assert_eq!(
            lines[4],
            "Prompt 1000000 tokens / 1M tokens * $2.500000 + Completion 0 tokens / 1M tokens * $10.000000 \
             + Audio prompt 500000 tokens / 1M tokens * $40.000000 + Audio completion 250000 tokens / 1M tokens * $80.000000 \
             * group 1 = $42.500000"
        );
    }

    #[test]
    fn test_missing_audio_ratio_defaults_to_zero() {
        let rates = rates(r#"{"ModelRatio": {"m": 1}}"#);
        let query = PriceQuery::builder()
            .model("m")
            .audio(AudioTokens {
                input: 1_000_000,
                completion: 1_000_000,
            })
            .build();

        let resolution = resolve_price(&query, &rates, &PricingDefaults::default()).unwrap();

        let audio_ratio = resolution.line(PriceComponent::AudioRatio).unwrap();
        assert_eq!(audio_ratio.value, Decimal::ZERO);
        assert_eq!(audio_ratio.source, RateSource::Defaulted);
        assert_eq!(resolution.total, Decimal::ZERO);
    }

    #[test]
    fn test_group_ratio_scales_every_term() {
        let rates = rates(r#"{"ModelRatio": {"m": 1}, "CompletionRatio": {"m": 3}}"#);
        let query = PriceQuery::builder()
            .model("m")
            .input_tokens(1_000_000)
            .completion_tokens(1_000_000)
            .group_ratio(d("0.5"))
            .build();

        let resolution = resolve_price(&query, &rates, &PricingDefaults::default()).unwrap();
        // (2 + 6) * 0.5
        assert_eq!(resolution.total, d("4"));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut rates = RateConfig::default();
        rates.model_ratio.insert("m".into(), Decimal::MAX);
        let query = PriceQuery::builder().model("m").input_tokens(1).build();
        assert!(matches!(
            resolve_price(&query, &rates, &PricingDefaults::default()),
            Err(Error::PriceOverflow { .. })
        ));
    }

    #[test]
    fn test_describe() {
        let rates = rates(r#"{"ModelPrice": {"mj": 0.1}, "ModelRatio": {"m": 0.5}, "CompletionRatio": {"m": 2}}"#);

        let fixed = resolve_price(&PriceQuery::builder().model("mj").build(), &rates, &PricingDefaults::default()).unwrap();
        assert_eq!(fixed.describe(), vec!["Model price: $0.100000 * group ratio 1 = $0.100000"]);

        let query = PriceQuery::builder()
            .model("m")
            .input_tokens(1_000_000)
            .completion_tokens(500_000)
            .build();
        let ratio = resolve_price(&query, &rates, &PricingDefaults::default()).unwrap();
        assert_eq!(
            ratio.describe(),
            vec![
                "Prompt price: $1.000000 / 1M tokens",
                "Completion price: $2.000000 / 1M tokens",
                "Prompt 1000000 tokens / 1M tokens * $1.000000 + Completion 500000 tokens / 1M tokens * $2.000000 * group 1 = $2.000000",
            ]
        );
    }

    #[test]
    fn test_unit_prices() {
        assert_eq!(unit_prices(d("0.5"), d("2"), d("1")), Some((d("1"), d("2"))));
        assert_eq!(unit_prices(d("1"), d("0"), d("1.5")), Some((d("3"), d("0"))));
    }
}
