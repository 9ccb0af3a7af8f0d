use controls::Control;

/// Text telling the model how to shape its reply for `schema`.
pub fn format_instructions(schema: &serde_json::Value) -> String {
    let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        r#"The output must be a JSON instance that conforms to the JSON schema below.

```
{}
```"#,
        rendered
    )
}

pub fn build_assessment_prompt(document_text: &str, control: &Control, format_instructions: &str) -> String {
    format!(
        r#"You are an expert cybersecurity auditor specialised in the ISO 27001:2022 standard.
Your task is to analyse the text of the provided document and determine whether it covers the specific Annex A control.

DOCUMENT:
---
{}
---

CONTROL TO ANALYSE:
- ID: {}
- Description: {}

RESPOND ONLY with a JSON object that matches the following schema. Do not add any text before or after the JSON.
{}"#,
        document_text, control.id, control.description, format_instructions
    )
}

pub fn build_policy_draft_prompt(control_id: &str, description: &str) -> String {
    format!(
        r#"You are an expert consultant in cybersecurity and the ISO 27001:2022 standard.
Your task is to write a draft of a basic policy or procedure for an organisation that needs to cover a specific Annex A control.
The draft must be clear, concise and practical. It must include an objective, a scope and the main guidelines or responsibilities.

CONTROL TO DEVELOP:
- ID: {}
- Description: {}

Write a policy draft for this control. The policy should be a starting point that the organisation can adapt.
Do not include placeholders such as "[Company Name]". Stay generic.
The output format must be plain Markdown text."#,
        control_id, description
    )
}

pub fn build_risk_prompt(control_id: &str, description: &str) -> String {
    format!(
        r#"You are an expert in cybersecurity risk management and the ISO 27001:2022 standard.
Your task is to identify and briefly describe 2 or 3 common risks an organisation would face if it did NOT implement the following control.

CONTROL NOT IMPLEMENTED:
- ID: {}
- Description: {}

For each risk, describe:
1. **Risk name:** A clear and concise title.
2. **Description:** How the risk could materialise and its potential impact on the confidentiality, integrity and/or availability of information.

Format the output in Markdown. Use a heading for each risk."#,
        control_id, description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::assessment_schema;

    #[test]
    fn assessment_prompt_carries_all_inputs() {
        let control = Control::new("A.5.15", "Access control");
        let instructions = format_instructions(&assessment_schema());
        let prompt = build_assessment_prompt("We have an access control policy.", &control, &instructions);

        assert!(prompt.contains("We have an access control policy."));
        assert!(prompt.contains("- ID: A.5.15"));
        assert!(prompt.contains("- Description: Access control"));
        assert!(prompt.contains("\"justification\""));
    }

    #[test]
    fn generator_prompts_name_the_control() {
        let draft = build_policy_draft_prompt("A.8.13", "Information backup");
        assert!(draft.contains("A.8.13") && draft.contains("Information backup"));
        assert!(draft.contains("Markdown"));

        let risks = build_risk_prompt("A.8.13", "Information backup");
        assert!(risks.contains("NOT implement"));
        assert!(risks.contains("Information backup"));
    }
}
