//! Question answering prompt

/// Reply the model is told to give when the context lacks the answer
pub const MISSING_ANSWER_REPLY: &str =
    "I'm sorry, I don't have access to that specific information in my current knowledge base.";

/// Fill the answering template with retrieved context and the user's question
#[inline]
pub fn format_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an elite Knowledge Base Assistant for an internal corporate team.\n\
         Answer the user's question using ONLY the provided context.\n\
         \n\
         RULES:\n\
         1. If the answer isn't in the context, say: \"{MISSING_ANSWER_REPLY}\"\n\
         2. Always list the source file name at the end of your response.\n\
         3. Be professional, concise, and accurate.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Answer:\n"
    )
}
