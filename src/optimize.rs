//! Owner-level optimization heuristics.
//!
//! Each entry point is a linear heuristic over caller-supplied collections:
//! a fixed baseline efficiency, a fixed bonus when the relevant data exists,
//! and ROI as annualized monthly savings over a fixed implementation cost.
//! `None` means there was nothing to optimize.

use crate::models::{
    HarvestRecord, ListingRecord, NutrientAnalysis, OptimizationKind, OptimizationResult, Sensor,
};

// ---

const MONTHS_PER_YEAR: f64 = 12.0;

/// Constants for one intervention type.
struct Heuristic {
    kind: OptimizationKind,
    baseline: f64,
    bonus: f64,
    savings_per_point: f64,
    implementation_cost: f64,
}

const IRRIGATION: Heuristic = Heuristic {
    kind: OptimizationKind::Irrigation,
    baseline: 75.0,
    bonus: 15.0,
    savings_per_point: 0.5,
    implementation_cost: 500.0,
};

const FERTILIZER: Heuristic = Heuristic {
    kind: OptimizationKind::Fertilizer,
    baseline: 70.0,
    bonus: 12.0,
    savings_per_point: 0.8,
    implementation_cost: 800.0,
};

const HARVEST: Heuristic = Heuristic {
    kind: OptimizationKind::Harvest,
    baseline: 65.0,
    bonus: 10.0,
    savings_per_point: 1.2,
    implementation_cost: 1200.0,
};

impl Heuristic {
    // ---
    fn evaluate(&self, data_present: bool, recommendations: Vec<String>) -> OptimizationResult {
        let optimized = if data_present { self.baseline + self.bonus } else { self.baseline };
        let improvement = optimized - self.baseline;
        let estimated_savings = improvement * self.savings_per_point;

        OptimizationResult {
            kind: self.kind,
            current_efficiency: self.baseline,
            optimized_efficiency: optimized,
            improvement,
            recommendations,
            estimated_savings,
            implementation_cost: self.implementation_cost,
            roi: estimated_savings * MONTHS_PER_YEAR / self.implementation_cost,
        }
    }
}

pub fn optimize_irrigation(soil_sensors: &[Sensor]) -> Option<OptimizationResult> {
    // ---
    if soil_sensors.is_empty() {
        return None;
    }

    let recommendations = vec![
        format!(
            "Schedule irrigation from live moisture readings across {} soil sensor(s)",
            soil_sensors.len()
        ),
        "Irrigate in the early morning to reduce evaporation losses".to_string(),
        "Switch high-variance zones to drip irrigation".to_string(),
    ];
    Some(IRRIGATION.evaluate(true, recommendations))
}

pub fn optimize_fertilizer(
    soil_sensors: &[Sensor],
    analyses: &[NutrientAnalysis],
) -> Option<OptimizationResult> {
    // ---
    if soil_sensors.is_empty() && analyses.is_empty() {
        return None;
    }

    let mut recommendations = Vec::new();
    if !soil_sensors.is_empty() {
        recommendations
            .push("Apply variable-rate fertilization guided by soil sensor zones".to_string());
    }
    if let Some(latest) = analyses.iter().max_by_key(|a| a.analyzed_at) {
        recommendations.push(format!(
            "Balance N-P-K against latest analysis ({:.1}/{:.1}/{:.1})",
            latest.nitrogen, latest.phosphorus, latest.potassium
        ));
    }
    recommendations.push("Split nitrogen applications to match crop uptake stages".to_string());

    Some(FERTILIZER.evaluate(!soil_sensors.is_empty(), recommendations))
}

pub fn optimize_harvest(
    harvests: &[HarvestRecord],
    listings: &[ListingRecord],
) -> Option<OptimizationResult> {
    // ---
    if harvests.is_empty() {
        return None;
    }

    let mut recommendations = vec![
        format!("Time harvest windows from {} past harvest record(s)", harvests.len()),
        "Harvest at optimal crop moisture to reduce drying and storage losses".to_string(),
    ];
    if !listings.is_empty() {
        recommendations.push("Align harvest dates with historical listing price peaks".to_string());
    }

    Some(HARVEST.evaluate(true, recommendations))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::alerting::tests::sample_sensor;
    use crate::models::Thresholds;
    use chrono::{TimeZone, Utc};

    fn soil() -> Vec<Sensor> {
        vec![sample_sensor(Thresholds {
            min: 20.0,
            max: 80.0,
            critical: 15.0,
        })]
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn analysis() -> NutrientAnalysis {
        NutrientAnalysis {
            owner_id: "farmer-1".to_string(),
            field_id: None,
            analyzed_at: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
            nitrogen: 42.0,
            phosphorus: 18.5,
            potassium: 120.0,
        }
    }

    fn harvest() -> HarvestRecord {
        HarvestRecord {
            owner_id: "farmer-1".to_string(),
            crop: "maize".to_string(),
            harvested_at: Utc.with_ymd_and_hms(2024, 9, 15, 0, 0, 0).unwrap(),
            quantity_kg: 5000.0,
        }
    }

    #[test]
    fn test_irrigation_nothing_to_optimize() {
        // ---
        assert!(optimize_irrigation(&[]).is_none());
    }

    #[test]
    fn test_irrigation_constants() {
        // ---
        let r = optimize_irrigation(&soil()).unwrap();
        assert_eq!(r.kind, OptimizationKind::Irrigation);
        assert!(close(r.current_efficiency, 75.0));
        assert!(close(r.optimized_efficiency, 90.0));
        assert!(close(r.improvement, 15.0));
        assert!(close(r.estimated_savings, 7.5));
        assert!(close(r.implementation_cost, 500.0));
        assert!(close(r.roi, 0.18));
        assert!(!r.recommendations.is_empty());
    }

    #[test]
    fn test_fertilizer_with_sensors() {
        // ---
        let r = optimize_fertilizer(&soil(), &[]).unwrap();
        assert!(close(r.improvement, 12.0));
        assert!(close(r.estimated_savings, 9.6));
        assert!(close(r.roi, 9.6 * 12.0 / 800.0));
    }

    #[test]
    fn test_fertilizer_analyses_only_has_no_bonus() {
        // ---
        let r = optimize_fertilizer(&[], &[analysis()]).unwrap();
        assert!(close(r.optimized_efficiency, 70.0));
        assert!(close(r.improvement, 0.0));
        assert!(close(r.roi, 0.0));
        assert!(r.recommendations.iter().any(|s| s.contains("42.0/18.5/120.0")));

        assert!(optimize_fertilizer(&[], &[]).is_none());
    }

    #[test]
    fn test_harvest() {
        // ---
        assert!(optimize_harvest(&[], &[]).is_none());

        let r = optimize_harvest(&[harvest()], &[]).unwrap();
        assert!(close(r.improvement, 10.0));
        assert!(close(r.estimated_savings, 12.0));
        assert!(close(r.implementation_cost, 1200.0));
        assert!(close(r.roi, 0.12));
    }
}
