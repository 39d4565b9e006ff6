//! Preference-based car recommendations
//!
//! Each criterion the buyer filled in adds a fixed weight when the car
//! satisfies it:
//!
//! | Criterion    | Weight      |
//! |--------------|-------------|
//! | Budget       | 30          |
//! | Primary use  | 20          |
//! | Fuel         | 15          |
//! | Features     | 5 per match |
//! | Lifestyle    | 15          |
//! | Family size  | 20          |
//!
//! The total is capped at 100 once, after every criterion has been evaluated.

use crate::models::{Car, CarType, Lifestyle, PreferenceVector, PrimaryUse, ScoredCar};

const BUDGET_WEIGHT: u32 = 30;
const PRIMARY_USE_WEIGHT: u32 = 20;
const FUEL_WEIGHT: u32 = 15;
const FEATURE_WEIGHT: u32 = 5;
const LIFESTYLE_WEIGHT: u32 = 15;
const FAMILY_SIZE_WEIGHT: u32 = 20;

const MAX_SCORE: u32 = 100;

/// Number of cars `recommend` returns
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Body styles suited to each primary use
const PRIMARY_USE_TYPES: &[(PrimaryUse, &[CarType])] = &[
    (PrimaryUse::Commuting, &[CarType::Sedan, CarType::Hatchback]),
    (PrimaryUse::Family, &[CarType::Suv, CarType::Minivan]),
    (PrimaryUse::Luxury, &[CarType::Sedan, CarType::Suv]),
    (PrimaryUse::Performance, &[CarType::Coupe, CarType::Sedan]),
    (PrimaryUse::Adventure, &[CarType::Suv, CarType::Truck]),
];

/// Body styles suited to each lifestyle
const LIFESTYLE_TYPES: &[(Lifestyle, &[CarType])] = &[
    (Lifestyle::Urban, &[CarType::Sedan, CarType::Hatchback]),
    (Lifestyle::Suburban, &[CarType::Suv, CarType::Sedan]),
    (Lifestyle::Rural, &[CarType::Suv, CarType::Truck]),
    (Lifestyle::Active, &[CarType::Suv, CarType::Crossover]),
    (Lifestyle::Luxury, &[CarType::Sedan, CarType::Suv]),
];

/// Body styles suited to a primary use
pub fn types_for_use(primary_use: PrimaryUse) -> &'static [CarType] {
    PRIMARY_USE_TYPES
        .iter()
        .find(|(u, _)| *u == primary_use)
        .map(|(_, types)| *types)
        .unwrap_or(&[])
}

/// Body styles suited to a lifestyle
pub fn types_for_lifestyle(lifestyle: Lifestyle) -> &'static [CarType] {
    LIFESTYLE_TYPES
        .iter()
        .find(|(l, _)| *l == lifestyle)
        .map(|(_, types)| *types)
        .unwrap_or(&[])
}

/// Score one car against a buyer's preferences
///
/// Missing car data (no variants, no seating capacity, no price) is a
/// non-match for the criterion that needs it.
pub fn score(car: &Car, preferences: &PreferenceVector) -> ScoredCar {
    let mut total = 0u32;
    let mut reasons = Vec::new();

    if let Some((min, max)) = preferences.budget {
        if let Some(price) = car.reference_price() {
            if price >= min && price <= max {
                total += BUDGET_WEIGHT;
                reasons.push(format!(
                    "Fits your budget of {} - {}",
                    format_dollars(min),
                    format_dollars(max)
                ));
            }
        }
    }

    if let Some(primary_use) = preferences.primary_use {
        if types_for_use(primary_use).contains(&car.car_type) {
            total += PRIMARY_USE_WEIGHT;
            reasons.push(format!("Perfect for {}", primary_use));
        }
    }

    if let Some(fuel) = preferences.fuel_preference.as_deref() {
        let available = car.variants.iter().any(|v| {
            v.specifications
                .fuel_type
                .as_deref()
                .is_some_and(|f| f.eq_ignore_ascii_case(fuel))
        });
        if available {
            total += FUEL_WEIGHT;
            reasons.push(format!("Available in {}", fuel));
        }
    }

    if !preferences.must_have_features.is_empty() {
        if let Some(variant) = car.primary_variant() {
            let specs = &variant.specifications;
            let matched: Vec<&str> = preferences
                .must_have_features
                .iter()
                .filter(|wanted| {
                    specs
                        .infotainment
                        .iter()
                        .chain(specs.comfort_features.iter())
                        .any(|have| have == *wanted)
                })
                .map(String::as_str)
                .collect();

            if !matched.is_empty() {
                total += FEATURE_WEIGHT * matched.len() as u32;
                reasons.push(format!("Includes {}", matched.join(", ")));
            }
        }
    }

    if let Some(lifestyle) = preferences.lifestyle {
        if types_for_lifestyle(lifestyle).contains(&car.car_type) {
            total += LIFESTYLE_WEIGHT;
            reasons.push(format!("Suited for {} lifestyle", lifestyle));
        }
    }

    if let Some(family_size) = preferences.family_size {
        let seats = car
            .primary_variant()
            .and_then(|v| v.specifications.seating_capacity);
        if let Some(seats) = seats.filter(|&s| s >= family_size) {
            total += FAMILY_SIZE_WEIGHT;
            reasons.push(format!("Seats {} people comfortably", seats));
        }
    }

    ScoredCar {
        car: car.clone(),
        match_score: total.min(MAX_SCORE),
        match_reasons: reasons,
    }
}

/// Score the whole catalog and keep the best matches
///
/// Sorted by score, highest first; equal scores keep catalog order.
pub fn recommend(preferences: &PreferenceVector, catalog: &[Car]) -> Vec<ScoredCar> {
    let mut scored: Vec<ScoredCar> = catalog.iter().map(|car| score(car, preferences)).collect();
    // sort_by is stable
    scored.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    scored.truncate(MAX_RECOMMENDATIONS);
    scored
}

/// "$20,000" style amount, rounded to whole dollars
pub fn format_dollars(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}
