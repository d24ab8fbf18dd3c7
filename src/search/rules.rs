// Rule tables
//
// *Les Règles* (The Rules) - Ordered regex tables for intents, entities and category names
//
// Tables are compiled once and shared read-only. Declaration order is the
// only tie-breaker between overlapping patterns.

use once_cell::sync::Lazy;
use regex::{Match, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Coarse purpose of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Something urgent ("urgence", "sos")
    Emergency,

    /// Looking for a place (default)
    SearchPlace,

    /// Looking for something open right now
    FindOpenNow,

    /// Looking for a specific service or dish
    FindByService,

    /// Asking for opening hours
    AskHours,

    /// Asking for a phone number, email or website
    AskContact,

    /// Asking how to get somewhere
    AskDirections,

    /// Asking for a comparison or recommendation
    ComparePlaces,
}

impl Intent {
    /// Intent returned when no rule matches
    pub const DEFAULT: Intent = Intent::SearchPlace;

    /// Snake-case label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Emergency => "emergency",
            Intent::SearchPlace => "search_place",
            Intent::FindOpenNow => "find_open_now",
            Intent::FindByService => "find_by_service",
            Intent::AskHours => "ask_hours",
            Intent::AskContact => "ask_contact",
            Intent::AskDirections => "ask_directions",
            Intent::ComparePlaces => "compare_places",
        }
    }

    /// Parse a snake-case label
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "emergency" => Some(Intent::Emergency),
            "search_place" => Some(Intent::SearchPlace),
            "find_open_now" => Some(Intent::FindOpenNow),
            "find_by_service" => Some(Intent::FindByService),
            "ask_hours" => Some(Intent::AskHours),
            "ask_contact" => Some(Intent::AskContact),
            "ask_directions" => Some(Intent::AskDirections),
            "compare_places" => Some(Intent::ComparePlaces),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of an extracted entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A dish or drink ("poulet", "attiéké")
    FoodItem,

    /// A kind of place ("restaurant", "pharmacie")
    ServiceType,

    /// A service offered ("vidange", "passeport")
    ServiceItem,

    /// A time expression ("ce soir", "maintenant")
    TimeConstraint,

    /// A location hint ("près de moi", "tokoin")
    Location,

    /// A price expression ("pas cher")
    PriceLevel,

    /// A quality expression ("excellent", "réputé")
    QualityLevel,

    /// A contact channel ("téléphone", "whatsapp")
    ContactChannel,

    /// A request for opening hours ("horaires")
    HoursRequest,

    /// A request for directions ("itinéraire")
    DirectionsRequest,
}

impl EntityKind {
    /// Every kind, in extraction order
    pub const ALL: [EntityKind; 10] = [
        EntityKind::FoodItem,
        EntityKind::ServiceType,
        EntityKind::ServiceItem,
        EntityKind::TimeConstraint,
        EntityKind::Location,
        EntityKind::PriceLevel,
        EntityKind::QualityLevel,
        EntityKind::ContactChannel,
        EntityKind::HoursRequest,
        EntityKind::DirectionsRequest,
    ];

    /// Snake-case label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::FoodItem => "food_item",
            EntityKind::ServiceType => "service_type",
            EntityKind::ServiceItem => "service_item",
            EntityKind::TimeConstraint => "time_constraint",
            EntityKind::Location => "location",
            EntityKind::PriceLevel => "price_level",
            EntityKind::QualityLevel => "quality_level",
            EntityKind::ContactChannel => "contact_channel",
            EntityKind::HoursRequest => "hours_request",
            EntityKind::DirectionsRequest => "directions_request",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent patterns, in declaration order.
///
/// Emergency is declared first so that "urgence hôpital" is not swallowed by
/// the place vocabulary of `search_place`.
const INTENT_PATTERNS: &[(Intent, &[&str])] = &[
    (
        Intent::Emergency,
        &[
            r"urgence",
            r"urgent",
            r"immédiatement",
            r"rapidement",
            r"problème",
            r"\baide\b",
            r"\bsos\b",
        ],
    ),
    (
        Intent::SearchPlace,
        &[
            r"trouve.*endroit", r"cherche.*endroit", r"où.*aller", r"où.*trouver",
            r"restaurant", r"maquis", r"\bbars?\b", r"café", r"boutique", r"magasin",
            r"pharmacie", r"hôpital", r"école", r"université", r"banque", r"garage",
            r"coiffure", r"centre.*jeux", r"cinéma", r"théâtre", r"église", r"mosquée",
            r"station.*service", r"clinique", r"laboratoire", r"centre.*formation",
            r"tribunal", r"mairie", r"préfecture", r"\bong\b", r"association",
        ],
    ),
    (
        Intent::FindOpenNow,
        &[
            r"ouvert.*maintenant", r"ouvert.*ce soir", r"ouvert.*aujourd['’]hui",
            r"qui.*ouvert", r"fermé", r"disponible", r"accessible.*maintenant",
        ],
    ),
    (
        Intent::FindByService,
        &[
            r"manger.*porc", r"manger.*poulet", r"manger.*poisson", r"manger.*riz",
            r"plat.*porc", r"plat.*poulet", r"cuisine.*africaine", r"cuisine.*locale",
            r"réparer.*voiture", r"coiffer", r"acheter.*médicament", r"étudier",
            r"prier", r"jouer", r"divertir", r"consulter.*médecin", r"faire.*analyse",
            r"prendre.*cours", r"se.*former", r"faire.*papiers", r"retirer.*argent",
        ],
    ),
    (
        Intent::AskHours,
        &[
            r"horaires", r"heures.*ouverture", r"ferme.*à", r"ouvre.*à",
            r"disponible.*quand", r"accessible.*quand",
        ],
    ),
    (
        Intent::AskContact,
        &[
            r"numéro", r"téléphone", r"whatsapp", r"contact", r"appeler",
            r"email", r"site.*web", r"adresse",
        ],
    ),
    (
        Intent::AskDirections,
        &[
            r"itinéraire", r"comment.*aller", r"où.*se.*trouve", r"direction",
            r"carte", r"localisation",
        ],
    ),
    (
        Intent::ComparePlaces,
        &[
            r"meilleur", r"comparer", r"différence", r"quel.*choisir",
            r"recommandation", r"suggestion", r"alternative",
        ],
    ),
];

/// Entity patterns, per category, in declaration order
const ENTITY_PATTERNS: &[(EntityKind, &[&str])] = &[
    (
        EntityKind::FoodItem,
        &[
            r"porc", r"poulet", r"poisson", r"riz", r"fufu", r"attiéké", r"alloco",
            r"pizza", r"burger", r"sandwich", r"\bjus\b", r"bière", r"cocktail",
        ],
    ),
    (
        EntityKind::ServiceType,
        &[
            r"restaurant", r"maquis", r"\bbars?\b", r"café", r"boutique", r"magasin", r"pharmacie",
            r"hôpital", r"clinique", r"école", r"université", r"banque", r"garage",
            r"coiffure", r"centre.*jeux", r"cinéma", r"théâtre", r"église", r"mosquée",
            r"station.*service", r"laboratoire", r"centre.*formation", r"tribunal",
            r"mairie", r"préfecture", r"\bong\b", r"association",
        ],
    ),
    (
        EntityKind::ServiceItem,
        &[
            r"médicament", r"consultation", r"analyse", r"vaccin", r"coiffure",
            r"manucure", r"pédicure", r"massage", r"essence", r"gasoil", r"vidange",
            r"réparation", r"\bcours\b", r"formation", r"diplôme", r"certificat",
            r"papiers", r"carte.*identité", r"passeport", r"permis", r"argent",
        ],
    ),
    (
        EntityKind::TimeConstraint,
        &[
            r"ce soir", r"aujourd['’]hui", r"maintenant", r"après-midi", r"matin",
            r"weekend", r"samedi", r"dimanche", r"urgence", r"immédiatement",
        ],
    ),
    (
        EntityKind::Location,
        &[
            r"près.*moi", r"proche", r"\bici\b", r"quartier", r"centre.*ville",
            r"\bbè\b", r"tokoin", r"adidogomé", r"agoè", r"nyékonakpoè", r"hédzranawoé",
        ],
    ),
    (
        EntityKind::PriceLevel,
        &[
            r"pas cher", r"bon marché", r"\bch[eè]re?s?\b", r"coûteux", r"économique",
            r"gratuit", r"payant", r"abordable", r"luxueux",
        ],
    ),
    (
        EntityKind::QualityLevel,
        &[
            r"excellent", r"\bbon(ne)?s?\b", r"moyen", r"mauvais", r"terrible",
            r"recommandé", r"populaire", r"connu", r"réputé",
        ],
    ),
    (
        EntityKind::ContactChannel,
        &[
            r"numéro", r"téléphone", r"whatsapp", r"e-?mail", r"site.*web", r"contact",
            r"appeler",
        ],
    ),
    (
        EntityKind::HoursRequest,
        &[r"horaires", r"heures.*ouverture", r"ouvre.*à", r"ferme.*à", r"quelle heure"],
    ),
    (
        EntityKind::DirectionsRequest,
        &[r"itinéraire", r"comment.*aller", r"où.*se.*trouve", r"direction", r"chemin"],
    ),
];

/// Service-type entity to category name, in declaration order
const CATEGORY_PATTERNS: &[(&str, &str)] = &[
    (r"restaurant|maquis", "Restaurant"),
    (r"\bbars?\b", "Bar"),
    (r"café", "Café"),
    (r"boutique|magasin", "Boutique"),
    (r"pharmacie", "Pharmacie"),
    (r"hôpital", "Hôpital"),
    (r"clinique", "Clinique"),
    (r"école", "École"),
    (r"université", "Université"),
    (r"banque", "Banque"),
    (r"garage", "Garage"),
    (r"coiffure", "Coiffure"),
    (r"centre.*jeux", "Centre de jeux"),
    (r"cinéma", "Cinéma"),
    (r"théâtre", "Théâtre"),
    (r"église", "Église"),
    (r"mosquée", "Mosquée"),
    (r"station.*service", "Station-service"),
    (r"laboratoire", "Laboratoire"),
    (r"centre.*formation", "Centre de formation"),
    (r"tribunal", "Tribunal"),
    (r"mairie", "Mairie"),
    (r"préfecture", "Préfecture"),
    (r"\bong\b", "ONG"),
    (r"association", "Association"),
];

/// Rule compilation errors
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// A pattern failed to compile
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,

        /// Underlying regex error
        #[source]
        source: regex::Error,
    },
}

/// A single labelled pattern
#[derive(Debug, Clone)]
pub struct Rule<L> {
    /// Label returned when the pattern matches
    pub label: L,

    /// Compiled, case-insensitive pattern
    pub pattern: Regex,
}

/// An ordered table of labelled patterns
#[derive(Debug, Clone)]
pub struct RuleTable<L> {
    rules: Vec<Rule<L>>,
}

impl<L: Copy + PartialEq> RuleTable<L> {
    /// Compile a table from `(label, patterns)` groups, keeping declaration order
    pub fn compile(groups: &[(L, &[&str])]) -> Result<Self, RuleError> {
        let mut rules = Vec::new();
        for (label, patterns) in groups {
            for pattern in *patterns {
                rules.push(Rule {
                    label: *label,
                    pattern: compile_pattern(pattern)?,
                });
            }
        }
        Ok(Self { rules })
    }

    /// First rule (in declaration order) whose pattern matches anywhere in `haystack`
    pub fn first_match<'h>(&self, haystack: &'h str) -> Option<(L, Match<'h>)> {
        self.rules
            .iter()
            .find_map(|rule| rule.pattern.find(haystack).map(|m| (rule.label, m)))
    }

    /// First match among the rules carrying `label`
    pub fn first_match_for<'h>(&self, label: L, haystack: &'h str) -> Option<Match<'h>> {
        self.rules
            .iter()
            .filter(|rule| rule.label == label)
            .find_map(|rule| rule.pattern.find(haystack))
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[Rule<L>] {
        &self.rules
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Ordered mapping from a service-type entity to a canonical category name
#[derive(Debug, Clone)]
pub struct CategoryMapping {
    entries: Vec<(Regex, String)>,
}

impl CategoryMapping {
    /// Compile a mapping from `(pattern, category name)` pairs
    pub fn compile(pairs: &[(&str, &str)]) -> Result<Self, RuleError> {
        let entries = pairs
            .iter()
            .map(|(pattern, name)| Ok((compile_pattern(pattern)?, name.to_string())))
            .collect::<Result<Vec<_>, RuleError>>()?;
        Ok(Self { entries })
    }

    /// Category name for a service-type entity, if any pattern matches
    pub fn resolve(&self, service_type: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.is_match(service_type))
            .map(|(_, name)| name.as_str())
    }
}

/// Every rule table the analyzer and planner need
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// Intent table
    pub intents: RuleTable<Intent>,

    /// Entity table, grouped by kind
    pub entities: RuleTable<EntityKind>,

    /// Service type to category name
    pub categories: CategoryMapping,
}

static BUILTIN: Lazy<Arc<RuleSet>> = Lazy::new(|| {
    Arc::new(RuleSet::new().expect("built-in rule tables must compile"))
});

impl RuleSet {
    /// Compile the built-in French rule tables
    pub fn new() -> Result<Self, RuleError> {
        Ok(Self {
            intents: RuleTable::compile(INTENT_PATTERNS)?,
            entities: RuleTable::compile(ENTITY_PATTERNS)?,
            categories: CategoryMapping::compile(CATEGORY_PATTERNS)?,
        })
    }

    /// Shared handle to the built-in tables, compiled on first use
    pub fn shared() -> Arc<RuleSet> {
        Arc::clone(&BUILTIN)
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, RuleError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| RuleError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}
