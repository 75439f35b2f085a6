mod anthropomorphic;
mod citation;
mod evidence;
mod identity;
mod language;
mod numeric;

pub use anthropomorphic::AnthropomorphicValidator;
pub use citation::{CitationRelevanceValidator, CitationRequiredValidator};
pub use evidence::EvidenceOverlapValidator;
pub use identity::IdentityValidator;
pub use language::{detect_locale, Detection, LanguageValidator, LANGUAGE};
pub use numeric::NumericClaimsValidator;
