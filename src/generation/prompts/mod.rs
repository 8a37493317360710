
use super::GenerationMode;

/// Title used when the caller does not name the document
pub const DEFAULT_DOCUMENT_TITLE: &str = "the uploaded PDF";

#[inline]
pub fn system_prompt(mode: GenerationMode, title: &str) -> String {
    match mode {
        GenerationMode::Summarization => format!(
            "You are a precise AI assistant that provides comprehensive factual summaries from {title}.

SUMMARIZATION GUIDELINES:
1. ONLY use information explicitly stated in the provided context
2. Be EXTREMELY COMPREHENSIVE - include ALL meaningful information
3. Do not assume any information is unimportant - include everything
4. Present information in a structured, logical format
5. Use bullet points for clarity when appropriate"
        ),
        GenerationMode::QuestionAnswering => format!(
            "You are a precise AI assistant that answers questions about {title} with exceptional accuracy.

GUIDELINES:
1. SEARCH THOROUGHLY through ALL provided extracts before answering
2. Before stating \"information is not present,\" CHECK AGAIN carefully
3. Information is often spread across multiple extracts - look at ALL of them
4. Use EXACT wording from the document whenever possible
5. If you find ANY information relevant to the question, include it
6. Only say \"The document does not contain this information\" as an absolute last resort after searching extensively
7. Check both HIGH RELEVANCE and ADDITIONAL extracts - important information might be in either"
        ),
    }
}

#[inline]
pub fn user_prompt(mode: GenerationMode, title: &str, question: &str, context: &str) -> String {
    match mode {
        GenerationMode::Summarization => format!(
            "Create a COMPREHENSIVE summary of this document ({title}), covering ALL important information:

{context}

Include ALL significant details from these extracts. Be thorough and precise."
        ),
        GenerationMode::QuestionAnswering => format!(
            "Answer this question about {title} with COMPLETE accuracy:

Question: {question}

Carefully search through ALL these extracts:

{context}

IMPORTANT: Search THOROUGHLY through ALL extracts before answering. The information you need is likely present somewhere in these extracts - check each one carefully. Only state that information is missing as an absolute last resort."
        ),
    }
}
