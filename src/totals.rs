//! Quote Aggregation Engine.
//!
//! `compute_totals` is the single place totals come from; presentation layers
//! consume its output instead of re-deriving markup or grand totals. It is
//! pure and currency-agnostic: it sees dimensionless decimals and never
//! touches storage.

use crate::decimal::round_money;
use crate::models::{MaterialRecord, MaterialType, TaskRecord, Totals};
use rust_decimal::Decimal;

/// The materials side of a task. The variant is the single source of truth
/// for which branch contributes to the materials subtotal, so a task can
/// never contribute both its lump-sum estimate and itemized lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialsSpec {
    LumpSum { estimated_cost: Decimal },
    Itemized { materials: Vec<MaterialLine> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialLine {
    pub quantity: i64,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPricing {
    pub price: Decimal,
    pub materials: MaterialsSpec,
}

impl TaskPricing {
    /// Builds the pricing view from persisted rows. Materials rows attached
    /// to a lump-sum task are dropped here rather than double-counted.
    pub fn from_records(task: &TaskRecord, materials: &[MaterialRecord]) -> Self {
        let materials = match task.material_type {
            MaterialType::LumpSum => MaterialsSpec::LumpSum {
                estimated_cost: task.estimated_materials_cost,
            },
            MaterialType::Itemized => MaterialsSpec::Itemized {
                materials: materials
                    .iter()
                    .map(|material| MaterialLine {
                        quantity: material.quantity,
                        unit_price: material.unit_price,
                    })
                    .collect(),
            },
        };
        Self {
            price: task.price,
            materials,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteCharges {
    pub complexity_charge: Decimal,
    pub markup_percentage: Decimal,
}

/// Computes the five aggregation figures from one snapshot. Intermediate
/// arithmetic runs at full precision; each returned figure is rounded to the
/// monetary scale once, at the end. An empty task list yields all-zero
/// subtotals, with markup still applied to the complexity charge alone.
pub fn compute_totals(charges: QuoteCharges, tasks: &[TaskPricing]) -> Totals {
    let task_subtotal: Decimal = tasks.iter().map(|task| task.price).sum();

    let materials_subtotal: Decimal = tasks
        .iter()
        .map(|task| match &task.materials {
            MaterialsSpec::LumpSum { estimated_cost } => *estimated_cost,
            MaterialsSpec::Itemized { materials } => materials
                .iter()
                .map(|line| Decimal::from(line.quantity) * line.unit_price)
                .sum(),
        })
        .sum();

    let combined_subtotal = task_subtotal + materials_subtotal;
    let markup_charge = (combined_subtotal + charges.complexity_charge)
        * (charges.markup_percentage / Decimal::from(100));
    let grand_total = combined_subtotal + charges.complexity_charge + markup_charge;

    Totals {
        task_subtotal: round_money(task_subtotal),
        materials_subtotal: round_money(materials_subtotal),
        combined_subtotal: round_money(combined_subtotal),
        markup_charge: round_money(markup_charge),
        grand_total: round_money(grand_total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::models::{MaterialRecord, MaterialType, TaskRecord};

    fn dec(raw: &str) -> Decimal {
        raw.parse().expect("decimal literal")
    }

    fn charges(complexity: &str, markup: &str) -> QuoteCharges {
        QuoteCharges {
            complexity_charge: dec(complexity),
            markup_percentage: dec(markup),
        }
    }

    fn lump_sum_task(price: &str, estimate: &str) -> TaskPricing {
        TaskPricing {
            price: dec(price),
            materials: MaterialsSpec::LumpSum {
                estimated_cost: dec(estimate),
            },
        }
    }

    fn itemized_task(price: &str, lines: &[(i64, &str)]) -> TaskPricing {
        TaskPricing {
            price: dec(price),
            materials: MaterialsSpec::Itemized {
                materials: lines
                    .iter()
                    .map(|(quantity, unit_price)| MaterialLine {
                        quantity: *quantity,
                        unit_price: dec(unit_price),
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn lump_sum_quote_with_complexity_and_markup() {
        let totals = compute_totals(charges("50", "10"), &[lump_sum_task("200", "80")]);
        assert_eq!(totals.task_subtotal, dec("200"));
        assert_eq!(totals.materials_subtotal, dec("80"));
        assert_eq!(totals.combined_subtotal, dec("280"));
        assert_eq!(totals.markup_charge, dec("33.00"));
        assert_eq!(totals.grand_total, dec("363.00"));
    }

    #[test]
    fn itemized_quote_without_charges() {
        let totals = compute_totals(
            charges("0", "0"),
            &[itemized_task("100", &[(3, "10"), (1, "25")])],
        );
        assert_eq!(totals.task_subtotal, dec("100"));
        assert_eq!(totals.materials_subtotal, dec("55"));
        assert_eq!(totals.combined_subtotal, dec("155"));
        assert_eq!(totals.markup_charge, dec("0"));
        assert_eq!(totals.grand_total, dec("155"));
    }

    #[test]
    fn empty_quote_yields_all_zero_totals() {
        let totals = compute_totals(charges("0", "0"), &[]);
        assert_eq!(totals.task_subtotal, Decimal::ZERO);
        assert_eq!(totals.materials_subtotal, Decimal::ZERO);
        assert_eq!(totals.combined_subtotal, Decimal::ZERO);
        assert_eq!(totals.markup_charge, Decimal::ZERO);
        assert_eq!(totals.grand_total, Decimal::ZERO);
    }

    #[test]
    fn markup_applies_to_complexity_charge_even_with_no_tasks() {
        let totals = compute_totals(charges("50", "10"), &[]);
        assert_eq!(totals.combined_subtotal, Decimal::ZERO);
        assert_eq!(totals.markup_charge, dec("5.00"));
        assert_eq!(totals.grand_total, dec("55.00"));
    }

    #[test]
    fn itemized_task_never_contributes_its_lump_sum_estimate() {
        let now = Utc::now();
        let task = TaskRecord {
            id: "t-1".to_string(),
            quote_id: "q-1".to_string(),
            description: "framing".to_string(),
            price: dec("100"),
            estimated_materials_cost: dec("999"),
            material_type: MaterialType::Itemized,
            position: 0,
            created_at: now,
            updated_at: now,
        };
        let materials = vec![MaterialRecord {
            id: "m-1".to_string(),
            task_id: "t-1".to_string(),
            product_id: None,
            name: "studs".to_string(),
            quantity: 2,
            unit_price: dec("5"),
            notes: None,
            created_at: now,
            updated_at: now,
        }];
        let pricing = TaskPricing::from_records(&task, &materials);
        let totals = compute_totals(charges("0", "0"), &[pricing]);
        assert_eq!(totals.materials_subtotal, dec("10"));
    }

    #[test]
    fn stray_materials_on_a_lump_sum_task_are_ignored() {
        let now = Utc::now();
        let task = TaskRecord {
            id: "t-1".to_string(),
            quote_id: "q-1".to_string(),
            description: "demolition".to_string(),
            price: dec("200"),
            estimated_materials_cost: dec("80"),
            material_type: MaterialType::LumpSum,
            position: 0,
            created_at: now,
            updated_at: now,
        };
        let stray = vec![MaterialRecord {
            id: "m-1".to_string(),
            task_id: "t-1".to_string(),
            product_id: None,
            name: "dumpster".to_string(),
            quantity: 4,
            unit_price: dec("100"),
            notes: None,
            created_at: now,
            updated_at: now,
        }];
        let pricing = TaskPricing::from_records(&task, &stray);
        assert_eq!(
            pricing.materials,
            MaterialsSpec::LumpSum {
                estimated_cost: dec("80")
            }
        );
        let totals = compute_totals(charges("0", "0"), &[pricing]);
        assert_eq!(totals.materials_subtotal, dec("80"));
    }

    #[test]
    fn recomputation_is_idempotent() {
        let tasks = vec![
            lump_sum_task("199.99", "45.45"),
            itemized_task("750.10", &[(7, "3.33"), (2, "19.99")]),
        ];
        let first = compute_totals(charges("12.34", "17.5"), &tasks);
        let second = compute_totals(charges("12.34", "17.5"), &tasks);
        assert_eq!(first, second);
    }

    #[test]
    fn intermediate_precision_does_not_compound_rounding_error() {
        // 300 line items at 0.333 each: full-precision sum is 99.9, not a
        // per-line-rounded 99.90 vs 100.20 drift.
        let lines: Vec<(i64, &str)> = (0..300).map(|_| (1_i64, "0.333")).collect();
        let totals = compute_totals(charges("0", "0"), &[itemized_task("0", &lines)]);
        assert_eq!(totals.materials_subtotal, dec("99.90"));
    }
}
