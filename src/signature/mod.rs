//! Program signatures: the fingerprint a query + context pair is matched by.
//!
//! A [`ProgramSignature`] captures what kind of request this is (intent), what it
//! operates on (document types, content domains), and how heavy it is (length,
//! complexity). Signatures are produced by [`generate::generate_signature`] and
//! compared by [`similarity::signature_similarity`].

pub mod generate;
pub mod similarity;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt::Write;

pub use generate::generate_signature;
pub use similarity::signature_similarity;

/// Declares a snake_case string enum with `as_str`, `Display`, `FromStr`, and `ALL`.
macro_rules! str_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($(#[$vmeta:meta])* $variant:ident => $s:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// SQL-compatible string representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("unknown ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

str_enum! {
    /// What the user is asking for.
    pub enum Intent {
        QuestionAnswering => "question_answering",
        Summarization => "summarization",
        Analysis => "analysis",
        Comparison => "comparison",
        Explanation => "explanation",
        Research => "research",
        Creative => "creative",
        CodeAssistance => "code_assistance",
        Troubleshooting => "troubleshooting",
        /// Fallback when no intent keyword matched.
        General => "general",
    }
}

str_enum! {
    /// Kind of document present in the request context.
    pub enum DocumentType {
        Pdf => "pdf",
        Word => "word",
        Spreadsheet => "spreadsheet",
        Presentation => "presentation",
        Code => "code",
        Markdown => "markdown",
        Text => "text",
        Web => "web",
        Image => "image",
        Data => "data",
        Other => "other",
    }
}

str_enum! {
    /// Subject area detected in the query or its documents.
    pub enum ContentDomain {
        Technical => "technical",
        Financial => "financial",
        Legal => "legal",
        Medical => "medical",
        Scientific => "scientific",
        Business => "business",
        Academic => "academic",
        Personal => "personal",
        Security => "security",
    }
}

str_enum! {
    /// Query length band, by whitespace word count.
    pub enum LengthCategory {
        /// Up to 10 words.
        Short => "short",
        /// 11 to 30 words.
        Medium => "medium",
        /// 31 to 80 words.
        Long => "long",
        VeryLong => "very_long",
    }
}

str_enum! {
    pub enum ComplexityLevel {
        Simple => "simple",
        Moderate => "moderate",
        Complex => "complex",
    }
}

impl LengthCategory {
    pub fn from_word_count(words: usize) -> Self {
        match words {
            0..=10 => Self::Short,
            11..=30 => Self::Medium,
            31..=80 => Self::Long,
            _ => Self::VeryLong,
        }
    }

    pub(crate) fn ordinal(&self) -> u8 {
        *self as u8
    }
}

impl ComplexityLevel {
    pub(crate) fn ordinal(&self) -> u8 {
        *self as u8
    }
}

/// A document attached to the request, as described by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContextDocument {
    /// File name or URL.
    pub name: String,
    /// MIME type or short type name (`"pdf"`, `"text/markdown"`).
    #[serde(default)]
    pub content_type: Option<String>,
    /// Optional text excerpt used for domain detection.
    #[serde(default)]
    pub text: Option<String>,
}

/// Everything besides the query text that shapes a signature.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueryContext {
    #[serde(default)]
    pub documents: Vec<ContextDocument>,
    /// Whether the host runs reasoning with progress verification enabled.
    #[serde(default)]
    pub tpv_enabled: bool,
}

/// Fingerprint of a query + context pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSignature {
    pub primary_intent: Intent,
    pub secondary_intents: BTreeSet<Intent>,
    pub document_types: BTreeSet<DocumentType>,
    pub content_domains: BTreeSet<ContentDomain>,
    pub length_category: LengthCategory,
    pub complexity: ComplexityLevel,
    pub user_profile: Option<String>,
    pub tpv_enabled: bool,
    /// SHA-256 hex digest of [`ProgramSignature::canonical_string`].
    pub signature_hash: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("query must not be empty")]
    EmptyQuery,
}

impl ProgramSignature {
    /// Stable textual form of every matched field; the hash input.
    pub fn canonical_string(&self) -> String {
        fn join<T: std::fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
            items
                .into_iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(",")
        }

        format!(
            "intent={};secondary={};docs={};domains={};length={};complexity={};profile={};tpv={}",
            self.primary_intent,
            join(&self.secondary_intents),
            join(&self.document_types),
            join(&self.content_domains),
            self.length_category,
            self.complexity,
            self.user_profile.as_deref().unwrap_or(""),
            self.tpv_enabled,
        )
    }

    pub fn compute_hash(&self) -> String {
        let digest = Sha256::digest(self.canonical_string().as_bytes());
        let mut hex = String::with_capacity(64);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }

    /// Recompute and store `signature_hash` after the fields changed.
    pub fn rehash(&mut self) {
        self.signature_hash = self.compute_hash();
    }
}
