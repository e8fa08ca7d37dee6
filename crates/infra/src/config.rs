//! Workflow configuration loaded from the environment.

use anyhow::{Context, ensure};
use rust_decimal::Decimal;
use tracing::warn;

use gestor_core::NumberSequence;

pub const TAX_RATE: &str = "GESTOR_TAX_RATE";
pub const NUMBER_WIDTH: &str = "GESTOR_NUMBER_WIDTH";
pub const REQUISITION_PREFIX: &str = "GESTOR_REQUISITION_PREFIX";
pub const PURCHASE_ORDER_PREFIX: &str = "GESTOR_PURCHASE_ORDER_PREFIX";
pub const WRITE_OFF_PREFIX: &str = "GESTOR_WRITE_OFF_PREFIX";

/// Settings shared by the workflow services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// VAT applied to purchase orders (0.19 = 19 %).
    pub tax_rate: Decimal,
    pub number_width: usize,
    pub requisition_prefix: String,
    pub purchase_order_prefix: String,
    pub write_off_prefix: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(19, 2),
            number_width: 8,
            requisition_prefix: "SOL".to_string(),
            purchase_order_prefix: "OC".to_string(),
            write_off_prefix: "BAJA".to_string(),
        }
    }
}

impl WorkflowConfig {
    /// Read the `GESTOR_*` variables. Unset variables keep their defaults;
    /// invalid ones are logged and also keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        override_with(&lookup, TAX_RATE, parse_tax_rate, &mut config.tax_rate);
        override_with(&lookup, NUMBER_WIDTH, parse_width, &mut config.number_width);
        override_with(&lookup, REQUISITION_PREFIX, parse_prefix, &mut config.requisition_prefix);
        override_with(
            &lookup,
            PURCHASE_ORDER_PREFIX,
            parse_prefix,
            &mut config.purchase_order_prefix,
        );
        override_with(&lookup, WRITE_OFF_PREFIX, parse_prefix, &mut config.write_off_prefix);

        config
    }

    pub fn requisition_numbers(&self) -> NumberSequence {
        NumberSequence::new(&self.requisition_prefix, self.number_width)
    }

    pub fn purchase_order_numbers(&self) -> NumberSequence {
        NumberSequence::new(&self.purchase_order_prefix, self.number_width)
    }

    pub fn write_off_numbers(&self) -> NumberSequence {
        NumberSequence::new(&self.write_off_prefix, self.number_width)
    }
}

fn override_with<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    parse: fn(&str) -> anyhow::Result<T>,
    slot: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match parse(&raw) {
        Ok(value) => *slot = value,
        Err(err) => warn!(variable = key, value = %raw, error = %err, "invalid configuration value, using default"),
    }
}

fn parse_tax_rate(raw: &str) -> anyhow::Result<Decimal> {
    let rate: Decimal = raw
        .trim()
        .parse()
        .with_context(|| format!("{raw:?} is not a decimal number"))?;
    ensure!(
        rate >= Decimal::ZERO && rate < Decimal::ONE,
        "tax rate must be a fraction in [0, 1)"
    );
    Ok(rate)
}

fn parse_width(raw: &str) -> anyhow::Result<usize> {
    let width: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("{raw:?} is not a positive integer"))?;
    ensure!((1..=18).contains(&width), "number width must be between 1 and 18");
    Ok(width)
}

fn parse_prefix(raw: &str) -> anyhow::Result<String> {
    let prefix = raw.trim().to_uppercase();
    ensure!(!prefix.is_empty(), "prefix cannot be blank");
    ensure!(
        prefix.chars().all(|c| c.is_ascii_alphanumeric()),
        "prefix must be alphanumeric"
    );
    Ok(prefix)
}
