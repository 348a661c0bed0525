//! Intent routing: free-text utterance → catalog operation + parameters.
//!
//! Two sources produce the same [`Routed`] value:
//!
//! - [`IntentRouter`]: a local, deterministic heuristic. An ordered list of
//!   [`Rule`]s is checked against the lowercased utterance by substring
//!   containment; the first rule whose trigger occurs wins. Parameters are
//!   then pulled from the raw utterance with an ordered list of patterns
//!   (quoted text, `"<Name> uygulamasını"`, `"<Name> uygulaması"`, bare
//!   `"<Name> <verb>"`); the first pattern that matches wins. This is a
//!   heuristic, not language understanding.
//! - [`parse_tagged_action`]: reads the tagged-action vocabulary
//!   (`APP_ADD:`, `APP_SEARCH:`, `APP_EDIT:`, `APP_DELETE:`, `APP_LIST:`)
//!   out of a conversational model's reply.
//!
//! When a parameter cannot be extracted the result is
//! [`Routed::Clarify`], never an operation with a missing argument.
//!
//! Name patterns expect the application name to start with an uppercase
//! ASCII letter; lowercase names are only picked up when quoted.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::models::{fold_case, Category};

/// Catalog operation an utterance maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Search,
    Update,
    Delete,
    List,
    Chat,
}

impl Operation {
    /// Question asked back when the operation's parameter is missing.
    pub fn clarification_prompt(&self) -> &'static str {
        match self {
            Operation::Add => {
                "Hangi uygulamayı eklemek istiyorsunuz? Lütfen uygulama adını belirtin. Örnek: \"Canva uygulamasını ekle\""
            }
            Operation::Search => "Hangi uygulamayı arıyorsunuz? Örnek: \"Canva uygulamasını ara\"",
            Operation::Update => {
                "Hangi uygulamayı düzenlemek istiyorsunuz? Örnek: \"Spotify uygulamasını düzenle\""
            }
            Operation::Delete => "Hangi uygulamayı silmek istiyorsunuz? Örnek: \"Zoom uygulamasını sil\"",
            Operation::List | Operation::Chat => CHAT_UNRECOGNIZED,
        }
    }
}

/// Locally generated chat replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Help,
    Greeting,
    Unrecognized,
    /// Free text returned by a conversational model.
    Text(String),
}

impl ChatReply {
    pub fn text(&self) -> &str {
        match self {
            ChatReply::Help => CHAT_HELP,
            ChatReply::Greeting => CHAT_GREETING,
            ChatReply::Unrecognized => CHAT_UNRECOGNIZED,
            ChatReply::Text(t) => t,
        }
    }
}

const CHAT_HELP: &str = "🤖 **Mac Free Apps Asistanı Komutları:**

**📱 Uygulama Yönetimi:**
• \"Canva uygulamasını ekle\" - Uygulama ekleme
• \"Notion uygulamasını ara\" - Uygulama arama
• \"Spotify uygulamasını düzenle\" - Uygulama düzenleme
• \"Zoom uygulamasını sil\" - Uygulama silme

**📋 Listeleme:**
• \"Tüm uygulamaları listele\" - Tüm uygulamaları göster
• \"Tasarım uygulamalarını göster\" - Kategoriye göre listele";

const CHAT_GREETING: &str = "👋 Merhaba! Ben Mac Free Apps asistanınızım.

Size şu konularda yardımcı olabilirim:
• 📱 Uygulama ekleme ve düzenleme
• 🔍 Uygulama arama ve listeleme
• 📊 Kategori bazlı filtreleme

Ne yapmak istiyorsunuz?";

const CHAT_UNRECOGNIZED: &str = "🤔 Anlayamadım. Lütfen daha açık bir şekilde yazın.

**Örnekler:**
• \"Canva uygulamasını ekle\"
• \"Tüm uygulamaları listele\"
• \"Yardım\" yazın";

/// A fully parameterized operation ready to run against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Add { app_name: String },
    Search { term: String },
    Update { app_name: String, category: Option<Category> },
    Delete { app_name: String },
    List { category: Option<Category> },
    Chat(ChatReply),
}

impl Intent {
    pub fn operation(&self) -> Operation {
        match self {
            Intent::Add { .. } => Operation::Add,
            Intent::Search { .. } => Operation::Search,
            Intent::Update { .. } => Operation::Update,
            Intent::Delete { .. } => Operation::Delete,
            Intent::List { .. } => Operation::List,
            Intent::Chat(_) => Operation::Chat,
        }
    }
}

/// Outcome of routing an utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Execute(Intent),
    /// The operation was recognized but its parameter could not be extracted.
    Clarify(Operation),
}

impl Routed {
    pub fn operation(&self) -> Operation {
        match self {
            Routed::Execute(intent) => intent.operation(),
            Routed::Clarify(op) => *op,
        }
    }
}

/// One trigger rule. Rules are checked in list order; the first rule with
/// a trigger contained in the case-folded utterance wins.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    Add(&'static [&'static str]),
    Delete(&'static [&'static str]),
    Update(&'static [&'static str]),
    List(&'static [&'static str]),
    Search(&'static [&'static str]),
    Help(&'static [&'static str]),
    Greeting(&'static [&'static str]),
}

impl Rule {
    fn triggers(&self) -> &'static [&'static str] {
        match self {
            Rule::Add(t)
            | Rule::Delete(t)
            | Rule::Update(t)
            | Rule::List(t)
            | Rule::Search(t)
            | Rule::Help(t)
            | Rule::Greeting(t) => t,
        }
    }

    fn matches(&self, folded: &str) -> bool {
        self.triggers().iter().any(|t| folded.contains(&fold_case(t)))
    }
}

/// Default rule order.
pub const DEFAULT_RULES: &[Rule] = &[
    Rule::Add(&["ekle", "yeni", "add"]),
    Rule::Delete(&["sil", "kaldır", "çıkar", "delete", "remove"]),
    Rule::Update(&["güncelle", "düzenle", "değiştir", "edit", "update"]),
    Rule::List(&["listele", "göster", "tüm", "hepsi", "kategoriler", "list"]),
    Rule::Search(&["ara", "bul", "hangi", "search", "find"]),
    Rule::Help(&["yardım", "help", "nasıl", "komutlar"]),
    Rule::Greeting(&["merhaba", "selam", "hello", "hey"]),
];

/// Turkish (and canonical English) category words recognized in utterances.
const CATEGORY_WORDS: &[(&str, Category)] = &[
    ("verimlilik", Category::Productivity),
    ("tasarım", Category::Design),
    ("geliştirme", Category::Development),
    ("eğlence", Category::Entertainment),
    ("araçlar", Category::Utilities),
    ("güvenlik", Category::Security),
    ("productivity", Category::Productivity),
    ("design", Category::Design),
    ("development", Category::Development),
    ("entertainment", Category::Entertainment),
    ("utilities", Category::Utilities),
    ("security", Category::Security),
];

/// Local pattern-based router.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    rules: &'static [Rule],
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new(DEFAULT_RULES)
    }
}

impl IntentRouter {
    pub fn new(rules: &'static [Rule]) -> Self {
        Self { rules }
    }

    /// Route an utterance.
    ///
    /// ```rust
    /// use macfreeapps_core::intent::{Intent, IntentRouter, Routed};
    ///
    /// let router = IntentRouter::default();
    /// assert_eq!(
    ///     router.route("Canva uygulamasını ekle"),
    ///     Routed::Execute(Intent::Add { app_name: "Canva".into() })
    /// );
    /// ```
    pub fn route(&self, utterance: &str) -> Routed {
        let folded = fold_case(utterance);
        let Some(rule) = self.rules.iter().find(|r| r.matches(&folded)) else {
            return Routed::Execute(Intent::Chat(ChatReply::Unrecognized));
        };

        match rule {
            Rule::Add(_) => match extract_app_name(utterance, add_patterns()) {
                Some(app_name) => Routed::Execute(Intent::Add { app_name }),
                None => Routed::Clarify(Operation::Add),
            },
            Rule::Delete(_) => match extract_app_name(utterance, delete_patterns()) {
                Some(app_name) => Routed::Execute(Intent::Delete { app_name }),
                None => Routed::Clarify(Operation::Delete),
            },
            Rule::Update(_) => match extract_app_name(utterance, update_patterns()) {
                Some(app_name) => Routed::Execute(Intent::Update {
                    app_name,
                    category: category_in_text(&folded),
                }),
                None => Routed::Clarify(Operation::Update),
            },
            Rule::List(_) => Routed::Execute(Intent::List {
                category: category_in_text(&folded),
            }),
            Rule::Search(_) => match extract_app_name(utterance, search_patterns()) {
                Some(term) => Routed::Execute(Intent::Search { term }),
                None => Routed::Clarify(Operation::Search),
            },
            Rule::Help(_) => Routed::Execute(Intent::Chat(ChatReply::Help)),
            Rule::Greeting(_) => Routed::Execute(Intent::Chat(ChatReply::Greeting)),
        }
    }
}

/// First category word contained in `text`, compared case-folded.
pub fn category_in_text(text: &str) -> Option<Category> {
    let folded = fold_case(text);
    CATEGORY_WORDS
        .iter()
        .find(|(word, _)| folded.contains(&fold_case(word)))
        .map(|(_, c)| *c)
}

const QUOTED: &str = r#"["“”]([^"“”]+)["“”]"#;
const NAME: &str = r"([A-Z][a-zA-Z0-9\s]*)";

fn compile(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid name pattern"))
        .collect()
}

fn add_patterns() -> &'static [Regex] {
    static P: OnceLock<Vec<Regex>> = OnceLock::new();
    P.get_or_init(|| {
        compile(&[
            QUOTED.to_string(),
            format!("{} uygulamasını", NAME),
            format!("{} uygulaması", NAME),
            format!("{} ekle", NAME),
        ])
    })
}

fn search_patterns() -> &'static [Regex] {
    static P: OnceLock<Vec<Regex>> = OnceLock::new();
    P.get_or_init(|| {
        compile(&[
            QUOTED.to_string(),
            format!("{} uygulamasını (?:ara|bul)", NAME),
            format!("{} (?:ara|bul)", NAME),
        ])
    })
}

fn update_patterns() -> &'static [Regex] {
    static P: OnceLock<Vec<Regex>> = OnceLock::new();
    P.get_or_init(|| {
        compile(&[
            QUOTED.to_string(),
            format!("{} uygulamasını", NAME),
            format!("{} uygulaması", NAME),
            format!("{} (?:güncelle|düzenle|değiştir)", NAME),
        ])
    })
}

fn delete_patterns() -> &'static [Regex] {
    static P: OnceLock<Vec<Regex>> = OnceLock::new();
    P.get_or_init(|| {
        compile(&[
            QUOTED.to_string(),
            format!("{} uygulamasını", NAME),
            format!("{} uygulaması", NAME),
            format!("{} (?:sil|kaldır)", NAME),
        ])
    })
}

/// Apply `patterns` in order; the first capture that is non-empty after
/// trimming wins.
fn extract_app_name(utterance: &str, patterns: &[Regex]) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(utterance)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

// ============ Tagged actions ============

/// Why a model reply carried no usable action.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty model response")]
    Empty,
    #[error("no tagged action in model response")]
    NoTaggedAction,
}

/// A tagged action found in a model reply, plus the reply text with the
/// tag line removed.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedAction {
    pub routed: Routed,
    pub message: String,
}

const TAGS: &[(&str, Operation)] = &[
    ("APP_ADD:", Operation::Add),
    ("APP_SEARCH:", Operation::Search),
    ("APP_EDIT:", Operation::Update),
    ("APP_DELETE:", Operation::Delete),
    ("APP_LIST:", Operation::List),
];

/// Parse a conversational model reply.
///
/// Tags are checked in vocabulary order. The argument is the rest of the
/// tag's line, with surrounding quotes or brackets removed; the message is
/// the reply with the tag and its argument cut out.
///
/// ```rust
/// use macfreeapps_core::intent::{parse_tagged_action, Intent, Routed};
///
/// let action = parse_tagged_action("APP_SEARCH: Figma\n\n🔍 Arıyorum!").unwrap();
/// assert_eq!(action.routed, Routed::Execute(Intent::Search { term: "Figma".into() }));
/// assert_eq!(action.message, "🔍 Arıyorum!");
/// ```
pub fn parse_tagged_action(response: &str) -> Result<TaggedAction, ParseError> {
    if response.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let (tag, op, pos) = TAGS
        .iter()
        .find_map(|(tag, op)| response.find(tag).map(|pos| (*tag, *op, pos)))
        .ok_or(ParseError::NoTaggedAction)?;

    let after = &response[pos + tag.len()..];
    let line_end = after.find('\n').unwrap_or(after.len());
    let argument = after[..line_end]
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '[' | ']' | '“' | '”'))
        .trim()
        .to_string();

    let mut message = String::with_capacity(response.len());
    message.push_str(&response[..pos]);
    message.push_str(&after[line_end..]);
    let message = message.trim().to_string();

    let routed = match op {
        Operation::List => {
            let folded = fold_case(&argument);
            let category = match folded.as_str() {
                "" | "all" | "tümü" | "hepsi" => None,
                _ => Category::parse(&argument).or_else(|| category_in_text(&folded)),
            };
            Routed::Execute(Intent::List { category })
        }
        _ if argument.is_empty() => Routed::Clarify(op),
        Operation::Add => Routed::Execute(Intent::Add { app_name: argument }),
        Operation::Search => Routed::Execute(Intent::Search { term: argument }),
        Operation::Update => Routed::Execute(Intent::Update {
            app_name: argument,
            category: None,
        }),
        Operation::Delete => Routed::Execute(Intent::Delete { app_name: argument }),
        Operation::Chat => Routed::Clarify(Operation::Chat),
    };

    Ok(TaggedAction { routed, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(text: &str) -> Routed {
        IntentRouter::default().route(text)
    }

    #[test]
    fn test_add_with_uygulamasini_phrase() {
        assert_eq!(
            route("Canva uygulamasını ekle"),
            Routed::Execute(Intent::Add {
                app_name: "Canva".into()
            })
        );
    }

    #[test]
    fn test_add_prefers_quoted_name() {
        assert_eq!(
            route("\"DaVinci Resolve\" uygulamasını ekle"),
            Routed::Execute(Intent::Add {
                app_name: "DaVinci Resolve".into()
            })
        );
    }

    #[test]
    fn test_add_bare_name_multiword() {
        assert_eq!(
            route("Visual Studio Code ekle"),
            Routed::Execute(Intent::Add {
                app_name: "Visual Studio Code".into()
            })
        );
    }

    #[test]
    fn test_add_without_name_asks_for_clarification() {
        let routed = route("yeni bir uygulama ekle");
        assert_eq!(routed, Routed::Clarify(Operation::Add));
        assert_eq!(routed.operation(), Operation::Add);
    }

    #[test]
    fn test_trigger_match_ignores_case() {
        assert_eq!(route("Notion uygulamasını EKLE").operation(), Operation::Add);
    }

    #[test]
    fn test_list_all_has_no_category() {
        assert_eq!(
            route("Tüm uygulamaları listele"),
            Routed::Execute(Intent::List { category: None })
        );
    }

    #[test]
    fn test_uppercase_turkish_i_variants() {
        assert_eq!(
            route("TASARIM uygulamalarını göster"),
            Routed::Execute(Intent::List {
                category: Some(Category::Design)
            })
        );
        assert_eq!(
            route("Tüm uygulamaları LİSTELE"),
            Routed::Execute(Intent::List { category: None })
        );
        assert_eq!(category_in_text("GÜVENLİK uygulamaları"), Some(Category::Security));
    }

    #[test]
    fn test_list_with_turkish_category() {
        assert_eq!(
            route("Tasarım uygulamalarını göster"),
            Routed::Execute(Intent::List {
                category: Some(Category::Design)
            })
        );
    }

    #[test]
    fn test_search_phrase() {
        assert_eq!(
            route("Figma uygulamasını ara"),
            Routed::Execute(Intent::Search {
                term: "Figma".into()
            })
        );
    }

    #[test]
    fn test_delete_and_update() {
        assert_eq!(
            route("Zoom uygulamasını sil"),
            Routed::Execute(Intent::Delete {
                app_name: "Zoom".into()
            })
        );
        assert_eq!(
            route("Spotify uygulamasını düzenle"),
            Routed::Execute(Intent::Update {
                app_name: "Spotify".into(),
                category: None
            })
        );
    }

    #[test]
    fn test_update_picks_up_category() {
        assert_eq!(
            route("Canva uygulamasını tasarım olarak güncelle"),
            Routed::Execute(Intent::Update {
                app_name: "Canva".into(),
                category: Some(Category::Design)
            })
        );
    }

    #[test]
    fn test_lowercase_name_is_not_extracted() {
        assert_eq!(route("canva uygulamasını ekle"), Routed::Clarify(Operation::Add));
    }

    #[test]
    fn test_no_trigger_falls_back_to_chat() {
        let routed = route("Bugün hava çok güzel");
        assert_eq!(routed.operation(), Operation::Chat);
        assert_eq!(
            routed,
            Routed::Execute(Intent::Chat(ChatReply::Unrecognized))
        );
    }

    #[test]
    fn test_help_and_greeting() {
        assert_eq!(
            route("yardım"),
            Routed::Execute(Intent::Chat(ChatReply::Help))
        );
        assert_eq!(
            route("Merhaba"),
            Routed::Execute(Intent::Chat(ChatReply::Greeting))
        );
    }

    #[test]
    fn test_parse_tagged_add() {
        let action =
            parse_tagged_action("APP_ADD: Canva\n\n✅ \"Canva\" uygulamasını ekliyorum!").unwrap();
        assert_eq!(
            action.routed,
            Routed::Execute(Intent::Add {
                app_name: "Canva".into()
            })
        );
        assert_eq!(action.message, "✅ \"Canva\" uygulamasını ekliyorum!");
    }

    #[test]
    fn test_parse_tagged_strips_brackets() {
        let action = parse_tagged_action("Tamam! APP_DELETE: [Zoom]").unwrap();
        assert_eq!(
            action.routed,
            Routed::Execute(Intent::Delete {
                app_name: "Zoom".into()
            })
        );
        assert_eq!(action.message, "Tamam!");
    }

    #[test]
    fn test_parse_tagged_list_variants() {
        let all = parse_tagged_action("APP_LIST: all").unwrap();
        assert_eq!(all.routed, Routed::Execute(Intent::List { category: None }));

        let design = parse_tagged_action("APP_LIST: Tasarım").unwrap();
        assert_eq!(
            design.routed,
            Routed::Execute(Intent::List {
                category: Some(Category::Design)
            })
        );
    }

    #[test]
    fn test_parse_tagged_empty_argument_clarifies() {
        let action = parse_tagged_action("APP_EDIT:   \nHangi uygulama?").unwrap();
        assert_eq!(action.routed, Routed::Clarify(Operation::Update));
    }

    #[test]
    fn test_parse_plain_chat_is_error() {
        assert_eq!(
            parse_tagged_action("Merhaba, nasılsın?"),
            Err(ParseError::NoTaggedAction)
        );
        assert_eq!(parse_tagged_action("  "), Err(ParseError::Empty));
    }
}
