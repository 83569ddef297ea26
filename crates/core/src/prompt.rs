//! Prompt construction.
//!
//! Two mutually exclusive modes, selected by whether templated questions are
//! present. The structured-mode prompt pins the exact JSON shape the model
//! must return; the Q&A-mode prompt pins the heading/citation format the
//! renderer parses. Neither prompt mutates between retry attempts.

/// Build the analysis prompt for a patient.
pub fn build_prompt(patient_id: Option<&str>, questions: &[String]) -> String {
    if questions.is_empty() {
        structured_prompt(patient_id)
    } else {
        qna_prompt(patient_id, questions)
    }
}

fn patient_clause(patient_id: Option<&str>) -> String {
    match patient_id {
        Some(id) => format!(" Their patient ID is {id}."),
        None => String::new(),
    }
}

fn structured_prompt(patient_id: Option<&str>) -> String {
    format!(
        r#"Analyze the patient's complete medical history using all available FHIR data.{}

Return your results in JSON format:

{{
  "riskScores": [
    {{ "label": "Cardiovascular Risk", "score": "Moderate" }},
    {{ "label": "Diabetes Risk", "score": "Low" }}
  ],
  "recommendedTreatments": [
    {{ "treatment": "Metformin", "condition": "Type 2 Diabetes" }},
    {{ "treatment": "Lifestyle changes", "condition": "Obesity" }}
  ],
  "preventiveMeasures": [
    "Annual flu vaccination",
    "Blood pressure check every 6 months"
  ],
  "sources": [
    "Condition/abc123",
    "Observation/def456",
    "DocumentReference/file789"
  ],
  "summaryText": "A summary of the overall analysis of the patient's health.",
  "accuracy": 0.9,
  "accuracyExplanation": "The AI's confidence in the analysis based on available data."
}}

Be concise and medically accurate. Only use fields that are applicable. Do not invent data. If no data is available, use empty arrays."#,
        patient_clause(patient_id)
    )
}

fn qna_prompt(patient_id: Option<&str>, questions: &[String]) -> String {
    format!(
        r#"Analyze the patient's complete medical history using all available FHIR data.{}

Focus exclusively on answering the following user-provided questions. For each question:
- Restate the question as a heading.
- Provide a medically accurate and concise answer.
- If you did not find the answer, say "No relevant data found."
- Clearly cite the FHIR resources used to support your answer (e.g., Condition/abc123).

Questions:
- {}"#,
        patient_clause(patient_id),
        questions.join("\n- ")
    )
}

/// Prompt for analysing a single document's extracted content.
pub fn document_prompt(content_type: &str, content: &str) -> String {
    format!("Analyze this document content (Content-Type: {content_type}):\n{content}")
}
