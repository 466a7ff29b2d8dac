//! Lead scorer (§4.6): turns collected data and conversation metrics into a
//! 0-100 score, a temperature bucket, and human-readable reasons.
//!
//! Five capped categories — data completeness, engagement, urgency,
//! qualification bonuses, behavior — sum to the total, which is then
//! clamped to `[0, 100]`. Every rule here is a pure function of its inputs;
//! nothing about the scorer depends on wall-clock time except what the
//! caller already measured into `ConversationMetrics`.

use crate::graph::Weights;
use crate::validators::FieldValue;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadTemperature {
    Hot,
    Warm,
    Cold,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    DataCompleteness,
    Engagement,
    Urgency,
    Qualification,
    Behavior,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ScoreBreakdown {
    pub category: ScoreCategory,
    pub points: i32,
    pub max_points: i32,
    pub factors: Vec<String>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LeadScore {
    pub total: i32,
    pub max_possible: i32,
    pub temperature: LeadTemperature,
    pub breakdown: HashMap<String, ScoreBreakdown>,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
}

impl LeadScore {
    pub fn percentage(&self) -> f64 {
        if self.max_possible == 0 {
            0.0
        } else {
            (self.total as f64 / self.max_possible as f64 * 100.0 * 10.0).round() / 10.0
        }
    }
}

/// Conversation-level signals the scorer folds into engagement/behavior
/// (§4.6: "response behavior", "behavioral patterns").
#[derive(Clone, Debug, Default)]
pub struct ConversationMetrics {
    pub lead_messages: u32,
    pub avg_response_time_secs: f64,
    pub total_duration_minutes: f64,
    pub retries_per_field: HashMap<String, u32>,
    pub fields_collected_count: u32,
    pub questions_asked_by_lead: u32,
    pub had_negative_sentiment: bool,
}

fn present(data: &HashMap<String, FieldValue>, field: &str) -> bool {
    data.get(field).map(|v| !v.is_empty()).unwrap_or(false)
}

fn as_text(data: &HashMap<String, FieldValue>, field: &str) -> String {
    data.get(field).map(|v| v.to_string().to_lowercase()).unwrap_or_default()
}

fn budget_value(data: &HashMap<String, FieldValue>) -> f64 {
    data.get("budget").and_then(FieldValue::as_f64).unwrap_or(0.0)
}

/// Full score computation, mirroring the five-category breakdown.
pub fn calculate_score(
    data: &HashMap<String, FieldValue>,
    weights: &Weights,
    metrics: &ConversationMetrics,
) -> LeadScore {
    let data_score = data_completeness_score(data, weights);
    let engagement_score = engagement_score(metrics);
    let urgency_score = urgency_score(data);
    let qualification_score = qualification_score(data);
    let behavior_score = behavior_score(metrics);

    let raw_total = data_score.points
        + engagement_score.points
        + urgency_score.points
        + qualification_score.points
        + behavior_score.points;
    let total = raw_total.clamp(0, 100);
    let temperature = temperature_for(total);

    let reasons = build_reasons(data, metrics);
    let recommendations = build_recommendations(temperature, data);

    let mut breakdown = HashMap::new();
    breakdown.insert("data_completeness".to_string(), data_score);
    breakdown.insert("engagement".to_string(), engagement_score);
    breakdown.insert("urgency".to_string(), urgency_score);
    breakdown.insert("qualification".to_string(), qualification_score);
    breakdown.insert("behavior".to_string(), behavior_score);

    LeadScore {
        total,
        max_possible: 100,
        temperature,
        breakdown,
        reasons,
        recommendations,
    }
}

fn temperature_for(score: i32) -> LeadTemperature {
    if score >= 80 {
        LeadTemperature::Hot
    } else if score >= 50 {
        LeadTemperature::Warm
    } else {
        LeadTemperature::Cold
    }
}

fn data_completeness_score(data: &HashMap<String, FieldValue>, weights: &Weights) -> ScoreBreakdown {
    let mut points = 0i32;
    let mut factors = Vec::new();
    let mut fields: Vec<&String> = weights.keys().collect();
    fields.sort();
    for field in fields {
        let weight = weights[field];
        if present(data, field) {
            points += weight as i32;
            factors.push(format!("{field}: +{weight}"));
        }
    }
    ScoreBreakdown {
        category: ScoreCategory::DataCompleteness,
        points: points.min(50),
        max_points: 50,
        factors,
    }
}

fn engagement_score(metrics: &ConversationMetrics) -> ScoreBreakdown {
    let mut points = 0i32;
    let mut factors = Vec::new();

    if metrics.avg_response_time_secs > 0.0 && metrics.avg_response_time_secs < 60.0 {
        points += 5;
        factors.push("fast_response: +5".to_string());
    }
    if metrics.questions_asked_by_lead >= 2 {
        points += 5;
        factors.push("multiple_questions: +5".to_string());
    }
    if metrics.lead_messages >= 5 {
        points += 5;
        factors.push("engaged_conversation: +5".to_string());
    }
    if metrics.fields_collected_count >= 5 {
        points += 5;
        factors.push("all_answers: +5".to_string());
    }

    ScoreBreakdown {
        category: ScoreCategory::Engagement,
        points: points.min(20),
        max_points: 20,
        factors,
    }
}

const URGENCY_KEYWORDS: &[(&str, i32)] = &[
    ("imediata", 20),
    ("urgente", 20),
    ("imediato", 20),
    ("agora", 18),
    ("hoje", 18),
    ("amanha", 15),
    ("amanhã", 15),
    ("esta semana", 12),
    ("essa semana", 12),
    ("esse mes", 8),
    ("este mes", 8),
    ("proximo mes", 5),
    ("pesquisando", 2),
    ("sem pressa", 1),
];

fn urgency_score(data: &HashMap<String, FieldValue>) -> ScoreBreakdown {
    let mut points = 0i32;
    let mut factors = Vec::new();

    let urgency = as_text(data, "urgency");
    for (keyword, score) in URGENCY_KEYWORDS {
        if urgency.contains(keyword) {
            points = points.max(*score);
            factors.push(format!("urgency '{keyword}': +{score}"));
            break;
        }
    }

    let interest = as_text(data, "interest");
    for word in ["urgente", "preciso", "rapido", "imediato"] {
        if interest.contains(word) {
            points += 5;
            factors.push("interest implies urgency: +5".to_string());
            break;
        }
    }

    ScoreBreakdown {
        category: ScoreCategory::Urgency,
        points: points.min(20),
        max_points: 20,
        factors,
    }
}

fn qualification_score(data: &HashMap<String, FieldValue>) -> ScoreBreakdown {
    let mut points = 0i32;
    let mut factors = Vec::new();
    let budget = budget_value(data);

    let urgency = as_text(data, "urgency");
    if ["imediata", "urgente", "imediato", "agora", "hoje"].contains(&urgency.as_str()) {
        points += 15;
        factors.push("urgency_immediate: +15".to_string());
    }
    if budget > 50_000.0 {
        points += 10;
        factors.push("budget_high: +10".to_string());
    } else if (10_000.0..=50_000.0).contains(&budget) {
        points += 5;
        factors.push("budget_medium: +5".to_string());
    }
    if data.get("interest").map(|v| v.to_string().chars().count() > 20).unwrap_or(false) {
        points += 8;
        factors.push("specific_interest: +8".to_string());
    }
    if present(data, "phone") && present(data, "email") {
        points += 10;
        factors.push("full_contact: +10".to_string());
    }
    if present(data, "name") && present(data, "taxid") {
        points += 5;
        factors.push("full_identification: +5".to_string());
    }
    if present(data, "city") && (present(data, "cep") || present(data, "address")) {
        points += 5;
        factors.push("full_location: +5".to_string());
    }

    ScoreBreakdown {
        category: ScoreCategory::Qualification,
        points: points.clamp(0, 30),
        max_points: 30,
        factors,
    }
}

fn behavior_score(metrics: &ConversationMetrics) -> ScoreBreakdown {
    let mut points = 10i32; // neutral baseline
    let mut factors = Vec::new();

    if metrics.retries_per_field.values().any(|&r| r > 3) {
        points -= 10;
        factors.push("too_many_retries: -10".to_string());
    }
    if metrics.lead_messages > 0 && metrics.avg_response_time_secs < 2.0 {
        points -= 5;
        factors.push("responses_too_short: -5".to_string());
    }
    if metrics.avg_response_time_secs > 300.0 {
        points -= 5;
        factors.push("slow_to_respond: -5".to_string());
    }
    if metrics.total_duration_minutes > 60.0 {
        points -= 5;
        factors.push("conversation_too_long: -5".to_string());
    }
    if metrics.had_negative_sentiment {
        points -= 10;
        factors.push("negative_sentiment: -10".to_string());
    }

    if factors.is_empty() {
        factors.push("neutral_behavior: +10".to_string());
    }

    ScoreBreakdown {
        category: ScoreCategory::Behavior,
        points: points.clamp(-10, 10),
        max_points: 10,
        factors,
    }
}

fn build_reasons(data: &HashMap<String, FieldValue>, metrics: &ConversationMetrics) -> Vec<String> {
    let mut reasons = Vec::new();

    let field_count = data.values().filter(|v| !v.is_empty()).count();
    if field_count >= 5 {
        reasons.push(format!("Complete data ({field_count} fields collected)"));
    } else if field_count >= 3 {
        reasons.push(format!("Partial data ({field_count} fields collected)"));
    } else {
        reasons.push(format!("Little data collected ({field_count} fields)"));
    }

    match (present(data, "phone"), present(data, "email")) {
        (true, true) => reasons.push("Complete contact (phone and email)".to_string()),
        (true, false) => reasons.push("Phone provided".to_string()),
        (false, true) => reasons.push("Email provided".to_string()),
        (false, false) => {}
    }

    let urgency = as_text(data, "urgency");
    if ["imediata", "urgente", "imediato"].iter().any(|k| urgency.contains(k)) {
        reasons.push("High urgency".to_string());
    } else if ["semana", "esta"].iter().any(|k| urgency.contains(k)) {
        reasons.push("Medium urgency".to_string());
    }

    let budget = budget_value(data);
    if budget > 50_000.0 {
        reasons.push(format!("High budget (R$ {budget:.0})"));
    } else if budget > 10_000.0 {
        reasons.push(format!("Medium budget (R$ {budget:.0})"));
    }

    if metrics.questions_asked_by_lead >= 2 {
        reasons.push("Lead asked questions (high engagement)".to_string());
    }

    reasons
}

fn build_recommendations(temperature: LeadTemperature, data: &HashMap<String, FieldValue>) -> Vec<String> {
    let mut recommendations = Vec::new();

    match temperature {
        LeadTemperature::Hot => {
            recommendations.push("Entrar em contato imediatamente".to_string());
            recommendations.push("Preparar proposta personalizada".to_string());
        }
        LeadTemperature::Warm => {
            recommendations.push("Enviar mais informações".to_string());
            if !present(data, "email") {
                recommendations.push("Tentar coletar email para follow-up".to_string());
            }
            recommendations.push("Agendar follow-up em 24h".to_string());
        }
        LeadTemperature::Cold => {
            recommendations.push("Nutrir com conteúdo educativo".to_string());
            recommendations.push("Agendar follow-up em 3-5 dias".to_string());
        }
    }

    let mut missing = Vec::new();
    if !present(data, "phone") {
        missing.push("phone");
    }
    if !present(data, "email") {
        missing.push("email");
    }
    if !present(data, "budget") {
        missing.push("budget");
    }
    if !missing.is_empty() {
        recommendations.push(format!("Coletar: {}", missing.join(", ")));
    }

    recommendations
}
