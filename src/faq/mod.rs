// Canned answers for the questions users ask before uploading a document


/// Returned for any question that is not in the FAQ table
pub const FAQ_FALLBACK: &str = "I don't have specific information about that topic. To get detailed answers, please upload a PDF document that I can analyze for you, or ask about PakTeKHire's services, how it works, bolts, or payment structure.";

const FAQ_ENTRIES: &[(&str, &str)] = &[
    (
        "what is paktekhire",
        "PakTeKHire is a B2B platform for Pakistan, connecting businesses with skilled professionals, similar to Upwork. It focuses on facilitating hiring for projects without handling payments directly.",
    ),
    (
        "how does paktekhire work",
        "PakTeKHire allows businesses to post projects and hire professionals in Pakistan. We use 'bolts' instead of 'connects' to manage interactions. Payments are handled off-platform.",
    ),
    (
        "what are bolts",
        "Bolts are the currency used on PakTeKHire to manage interactions, similar to 'connects' on Upwork. They help you engage with potential clients or professionals.",
    ),
    (
        "is payment included",
        "No, PakTeKHire does not handle payments. It's a platform to connect businesses and professionals, and payment arrangements are made off-platform.",
    ),
];

/// Exact FAQ lookup after lowercasing and trimming; punctuation must match
#[inline]
pub fn lookup_faq(message: &str) -> Option<&'static str> {
    let normalized = message.trim().to_lowercase();
    FAQ_ENTRIES
        .iter()
        .find(|(question, _)| *question == normalized)
        .map(|(_, answer)| *answer)
}

#[inline]
pub fn answer_faq(message: &str) -> &'static str {
    lookup_faq(message).unwrap_or(FAQ_FALLBACK)
}

/// The questions the FAQ table can answer
#[inline]
pub fn faq_questions() -> impl Iterator<Item = &'static str> {
    FAQ_ENTRIES.iter().map(|(question, _)| *question)
}
