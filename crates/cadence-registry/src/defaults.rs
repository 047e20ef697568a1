//! Built-in capability set and alias table

use crate::capability::{ArgKind, ArgSpec, Capability, SideEffect};
use crate::registry::RegistryBuilder;

/// Curated alias table: known incorrect, synonymous or translated names
///
/// Keys are matched after cleaning and separator folding, so `Code-Gen` and
/// `code gen` both hit `code_gen`.
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    // code_generator
    ("code_gen", "code_generator"),
    ("codegen", "code_generator"),
    ("generate_code", "code_generator"),
    ("code_writer", "code_generator"),
    ("write_code", "code_generator"),
    ("coder", "code_generator"),
    ("generateur_de_code", "code_generator"),
    ("générateur_de_code", "code_generator"),
    ("generador_de_codigo", "code_generator"),
    ("generador_de_código", "code_generator"),
    ("codegenerator", "code_generator"),
    // web_fetch
    ("web_search", "web_fetch"),
    ("search_web", "web_fetch"),
    ("search", "web_fetch"),
    ("browse", "web_fetch"),
    ("browser", "web_fetch"),
    ("fetch_url", "web_fetch"),
    ("scrape", "web_fetch"),
    ("recherche_web", "web_fetch"),
    ("buscar_web", "web_fetch"),
    // call_model
    ("llm", "call_model"),
    ("chat_completion", "call_model"),
    ("text_generator", "call_model"),
    ("generate_text", "call_model"),
    ("ask_model", "call_model"),
    ("completion", "call_model"),
    // query_store
    ("db_query", "query_store"),
    ("find_documents", "query_store"),
    ("lookup", "query_store"),
    ("read_store", "query_store"),
    ("consulta_base", "query_store"),
    // write_store
    ("insert_document", "write_store"),
    ("save", "write_store"),
    ("store", "write_store"),
    ("upsert", "write_store"),
    ("db_write", "write_store"),
    // send_message
    ("send_msg", "send_message"),
    ("notify", "send_message"),
    ("reply", "send_message"),
    ("post_message", "send_message"),
    ("enviar_mensaje", "send_message"),
    ("envoyer_message", "send_message"),
    ("nachricht_senden", "send_message"),
    // http_request
    ("http", "http_request"),
    ("api_call", "http_request"),
    ("call_api", "http_request"),
    ("rest_call", "http_request"),
    ("webhook", "http_request"),
    // echo
    ("noop", "echo"),
    ("no_op", "echo"),
    ("pass", "echo"),
];

/// The built-in capability descriptors, in registration order
#[must_use]
pub fn default_capabilities() -> Vec<Capability> {
    vec![
        Capability::new("echo", SideEffect::Pure)
            .with_description("Return the resolved parameters as outputs")
            .with_keywords(["echo", "noop", "note", "record"]),
        Capability::new("call_model", SideEffect::ReadOnly)
            .with_description("Invoke a language model with a prompt")
            .with_arg(ArgSpec::required("prompt", ArgKind::String))
            .with_arg(ArgSpec::optional("model", ArgKind::String))
            .with_arg(ArgSpec::optional("system", ArgKind::String))
            .with_arg(ArgSpec::optional("temperature", ArgKind::Number))
            .with_keywords([
                "model", "llm", "prompt", "generate", "summarize", "summary", "answer", "ask",
                "classify", "translate", "text",
            ]),
        Capability::new("code_generator", SideEffect::ReadOnly)
            .with_description("Generate source code for a file")
            .with_arg(ArgSpec::required("filename", ArgKind::String))
            .with_arg(ArgSpec::optional("language", ArgKind::String))
            .with_arg(ArgSpec::optional("instructions", ArgKind::String))
            .with_keywords([
                "code", "program", "script", "function", "implement", "source", "compile",
            ]),
        Capability::new("web_fetch", SideEffect::ReadOnly)
            .with_description("Fetch a web page or run a web search")
            .with_arg(ArgSpec::optional("url", ArgKind::String))
            .with_arg(ArgSpec::optional("query", ArgKind::String))
            .with_keywords(["web", "search", "fetch", "browse", "url", "page", "website", "google"]),
        Capability::new("query_store", SideEffect::ReadOnly)
            .with_description("Query documents from the document store")
            .with_arg(ArgSpec::required("collection", ArgKind::String))
            .with_arg(ArgSpec::optional("filter", ArgKind::Object))
            .with_arg(ArgSpec::optional("limit", ArgKind::Number))
            .with_keywords(["find", "lookup", "database", "db", "collection", "documents", "read"]),
        Capability::new("write_store", SideEffect::Mutating)
            .with_description("Insert or update a document in the document store")
            .with_arg(ArgSpec::required("collection", ArgKind::String))
            .with_arg(ArgSpec::required("document", ArgKind::Object))
            .with_keywords(["save", "insert", "update", "persist", "write", "record", "upsert"]),
        Capability::new("send_message", SideEffect::Outbound)
            .with_description("Send a message over the session's messaging channel")
            .with_arg(ArgSpec::required("text", ArgKind::String))
            .with_arg(ArgSpec::optional("channel", ArgKind::String))
            .with_arg(ArgSpec::optional("recipient", ArgKind::String))
            .with_keywords(["send", "message", "notify", "reply", "tell", "chat", "respond"]),
        Capability::new("http_request", SideEffect::Outbound)
            .with_description("Perform an arbitrary HTTP request")
            .with_arg(ArgSpec::required("url", ArgKind::String))
            .with_arg(ArgSpec::optional("method", ArgKind::String))
            .with_arg(ArgSpec::optional("headers", ArgKind::Object))
            .with_arg(ArgSpec::optional("body", ArgKind::Any))
            .with_keywords(["http", "api", "endpoint", "post", "webhook", "rest"]),
    ]
}

impl RegistryBuilder {
    /// Builder pre-loaded with the built-in capabilities and aliases
    ///
    /// Further capabilities or aliases can be chained before `build()`.
    #[must_use]
    pub fn with_defaults() -> Self {
        default_capabilities()
            .into_iter()
            .fold(Self::new(), RegistryBuilder::register)
            .aliases(DEFAULT_ALIASES.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::{CapabilityRegistry, MatchKind, RegistryBuilder};

    #[test]
    fn defaults_build_cleanly() {
        let built = RegistryBuilder::with_defaults().build();
        assert!(built.is_ok(), "built-in table must validate: {built:?}");
    }

    #[test]
    fn defaults_match_assembled() {
        let validated = RegistryBuilder::with_defaults().build().unwrap();
        let assembled = CapabilityRegistry::with_defaults();
        assert_eq!(validated.len(), assembled.len());
        assert_eq!(validated.alias_count(), assembled.alias_count());
    }

    #[test]
    fn defaults_safest_is_echo() {
        let registry = CapabilityRegistry::with_defaults();
        assert_eq!(registry.safest().id.as_str(), "echo");
    }

    #[test]
    fn cross_language_alias() {
        let registry = CapabilityRegistry::with_defaults();
        let m = registry.canonicalize("Générateur de code").unwrap();
        assert_eq!(m.kind, MatchKind::Alias);
        assert_eq!(m.capability.as_str(), "code_generator");

        let m = registry.canonicalize("enviar-mensaje").unwrap();
        assert_eq!(m.capability.as_str(), "send_message");
    }

    #[test]
    fn extra_aliases_are_additive() {
        let registry = RegistryBuilder::with_defaults()
            .alias("ping_ops", "send_message")
            .build()
            .unwrap();
        assert_eq!(
            registry.canonicalize("ping-ops").map(|m| m.capability.to_string()),
            Some("send_message".to_string())
        );
        assert!(registry.canonicalize("codegen").is_some());
    }
}
