//! Prompt templates for CAC patient education.
//!
//! Every prompt is the shared preamble, a patient block and a content-specific outline,
//! closed by an instruction naming the response language.

use crate::models::{ContentType, PatientInfo};
use crate::risk::classify;

const BASE_SYSTEM_PROMPT: &str = r#"You are a cardiologist and health educator who writes patient education material about coronary artery calcium (CAC).

Follow these principles:
1. Use plain language and keep medical jargon to a minimum
2. Give accurate, evidence-based medical information
3. Make the content educational and practical
4. Keep a professional but warm tone
5. Personalise the advice to the patient's situation
6. Stress the importance of discussing decisions with their physician

Formatting requirements:
- Use bullet points or short paragraphs
- Mark key information in bold
- Include concrete, actionable recommendations"#;

const RISK_ASSESSMENT_OUTLINE: &str = r#"Write patient education material on **CAC risk assessment** covering:

1. **What coronary artery calcification is**
   - A simple definition of CAC
   - Why calcification happens

2. **Your test result**
   - Explain the patient's CAC score ({score})
   - What this score means
   - How it compares with people of the same age

3. **Cardiovascular risk**
   - Future cardiovascular event risk based on the CAC score
   - What the risk level means in practice

4. **Next steps**
   - Whether further tests are needed
   - How often to follow up
   - When to seek medical care"#;

const LIFESTYLE_OUTLINE: &str = r#"Write patient education material on **lifestyle improvement** covering:

1. **Diet**
   - Foods that support cardiovascular health
   - Foods to avoid
   - Concrete dietary principles

2. **Exercise**
   - Suitable types of exercise
   - Intensity and frequency
   - Precautions while exercising

3. **Daily habits**
   - Why quitting smoking and limiting alcohol matter
   - Stress management
   - Better sleep

4. **Weight management**
   - Healthy weight range
   - Weight-loss strategies where relevant

5. **Regular monitoring**
   - Items that need regular follow-up
   - Self-monitoring methods

Tailor the advice to the patient's risk level."#;

const MEDICATION_OUTLINE: &str = r#"Write patient education material on **medication therapy** covering:

1. **Whether medication is needed**
   - Why medication may be necessary at this risk level
   - When to start considering medication

2. **Common medications**
   - Statins (cholesterol lowering)
   - Antiplatelet agents
   - Blood pressure medication
   - Blood sugar medication where relevant

3. **Using medication safely**
   - Timing and method of taking medication
   - Possible side effects
   - Regular laboratory checks

4. **Medication and lifestyle**
   - Diet while on medication
   - Interactions with other drugs

5. **Important reminders**
   - Never stop medication without advice
   - Why regular follow-up visits matter
   - Discuss dose changes with the physician

**Important**: this information is for education only. Medication must be prescribed after a physician's assessment; do not buy or take medication on your own."#;

const NOT_PROVIDED: &str = "Not provided";
const NO_MEDICAL_HISTORY: &str = "No significant medical history";
const NO_LIFESTYLE_DETAILS: &str = "No details provided";

/// Builds the complete prompt for one patient and content type.
pub fn build_prompt(patient: &PatientInfo, content_type: ContentType, language: &str) -> String {
    let outline = match content_type {
        ContentType::RiskAssessment => {
            RISK_ASSESSMENT_OUTLINE.replace("{score}", &patient.cac_score.to_string())
        }
        ContentType::Lifestyle => LIFESTYLE_OUTLINE.to_string(),
        ContentType::Medication => MEDICATION_OUTLINE.to_string(),
    };

    format!(
        "{BASE_SYSTEM_PROMPT}\n\n{patient_block}\n\n{outline}\n\n{closing}",
        patient_block = patient_block(patient, content_type),
        closing = closing_instruction(language),
    )
}

fn patient_block(patient: &PatientInfo, content_type: ContentType) -> String {
    let mut lines = vec![
        "Patient information:".to_string(),
        format!("- Name: {}", patient.patient_name),
        format!("- Age: {} years", patient.patient_age),
    ];

    // The medication prompt has never included gender.
    if content_type != ContentType::Medication {
        lines.push(format!(
            "- Gender: {}",
            or_placeholder(&patient.gender, NOT_PROVIDED)
        ));
    }

    lines.push(format!("- CAC score: {}", patient.cac_score));
    lines.push(format!("- Risk level: {}", classify(patient.cac_score)));

    match content_type {
        ContentType::Lifestyle => lines.push(format!(
            "- Lifestyle: {}",
            or_placeholder(&patient.lifestyle_factors, NO_LIFESTYLE_DETAILS)
        )),
        ContentType::RiskAssessment | ContentType::Medication => lines.push(format!(
            "- Medical history: {}",
            or_placeholder(&patient.medical_history, NO_MEDICAL_HISTORY)
        )),
    }

    lines.join("\n")
}

fn or_placeholder<'a>(value: &'a Option<String>, placeholder: &'a str) -> &'a str {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(placeholder)
}

fn closing_instruction(language: &str) -> String {
    format!(
        "Respond in {}. Keep the content professional yet easy to understand.",
        language_name(language)
    )
}

/// Human-readable name for a BCP 47 style language tag. Unknown tags are passed through.
pub fn language_name(tag: &str) -> String {
    match tag.to_ascii_lowercase().as_str() {
        "zh-tw" | "zh-hant" => "Traditional Chinese (zh-TW)".to_string(),
        "zh-cn" | "zh-hans" => "Simplified Chinese (zh-CN)".to_string(),
        "en" | "en-us" | "en-gb" => "English".to_string(),
        "ja" | "ja-jp" => "Japanese".to_string(),
        _ => tag.to_string(),
    }
}
