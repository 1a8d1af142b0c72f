//! Prompt builders for the code-generation Q&A agent.
//!
//! The code prompt teaches the model the restricted analysis language the
//! executor understands; the narration prompts condition each step on the
//! question, the cleaned code and the previous step's answer.

/// Prompt asking the model for an analysis program.
pub fn code_prompt(schema_summary: &str, question: &str) -> String {
    format!(
        r#"You are a data assistant. Generate an analysis program to answer the user's question against the table `df`.

Respond with ONLY the code in a fenced code block. Do NOT explain.
Assign the final value to a variable called `result`.

The program is a single chain of operations on `df`:
- select("col", ...)           keep only these columns
- filter("col" <op> value)     <op> is one of == != > < >= <= ; values are numbers, "strings", true or false
- group_by("col", ...).agg(sum("col"), mean("col"), count(), min("col"), max("col"))
- sort("col")  or  sort("col", desc)
- head(n)
- terminal aggregates: sum("col"), mean("col"), min("col"), max("col"), count(), n_unique("col")

Aggregated columns are named `<col>_<fn>` (e.g. sum("revenue") -> revenue_sum); `count()` is named `count`.
Optionally add a second line `result.plot(bar)` (or line, histogram, scatter) when a chart helps.

Examples:
```
result = df.group_by("region").agg(sum("revenue")).sort("revenue_sum", desc)
```
```
result = df.filter("status" == "active").count()
```

{schema}

Question: {question}
Code:"#,
        schema = schema_summary,
        question = question,
    )
}

/// One-line plain-English answer from the computed result.
pub fn answer_prompt(question: &str, formatted_result: &str) -> String {
    format!(
        r#"You are a helpful analyst. The user asked: "{question}"

Their question was answered with the following result: {result}

Now write a clear, one-line answer in plain English."#,
        question = question,
        result = formatted_result,
    )
}

/// Step-by-step explanation of how the code answers the question.
pub fn explanation_prompt(question: &str, code: &str, answer: &str) -> String {
    format!(
        r#"Explain how the following analysis code answers the user's question step-by-step.

Question: {question}
Code:
{code}
Answer:
{answer}"#,
        question = question,
        code = code,
        answer = answer,
    )
}

/// Structured chain-of-thought breakdown.
pub fn reasoning_prompt(question: &str, code: &str, answer: &str) -> String {
    format!(
        r#"You are an expert data analyst.

Break down your reasoning step by step to explain how the code answers the user's question.

Use bullet points and clear, concise logic.

Include:
- What the question is asking
- What the code does
- How the logic connects to the answer
- Any assumptions made

Format your reasoning like:
- Step 1: ...
- Step 2: ...
- Step 3: ...

Question: {question}
Code:
{code}
Answer: {answer}"#,
        question = question,
        code = code,
        answer = answer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_prompt_embeds_schema_and_question() {
        let prompt = code_prompt("- `revenue` (f64)", "total revenue by region");
        assert!(prompt.contains("`revenue`"));
        assert!(prompt.contains("total revenue by region"));
        assert!(prompt.contains("result"));
    }

    #[test]
    fn test_narration_prompts_carry_prior_answer() {
        let prompt = explanation_prompt("q", "code", "the answer");
        assert!(prompt.contains("the answer"));
        let prompt = reasoning_prompt("q", "code", "the answer");
        assert!(prompt.contains("Step 1"));
    }
}
