// Response synthesis
//
// *La Réponse* (The Answer) - Pick a phrasing per slot and interpolate facts from the top result
//
// Phrasing is chosen by an injected RNG. Facts (name, distance, rating,
// status, contact values) never depend on which phrasing was picked.

use crate::search::rules::{EntityKind, Intent};
use crate::search::types::{Entities, RankedResult};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A family of equivalent phrasings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    /// Opening salutation
    Greeting,

    /// Count statement for emergency queries
    Emergency,

    /// Count statement for exactly one result
    SingleResult,

    /// Count statement for several results
    MultipleResults,

    /// Reply when nothing was found
    NoResults,

    /// Distance phrase, `{distance}`
    DistanceInfo,

    /// Open status
    StatusOpen,

    /// Closed status
    StatusClosed,

    /// Verification phrase, `{tier}`
    Verified,

    /// Rating phrase, `{rating}`
    Rating,

    /// Heading of the contact block
    ContactHeader,

    /// Hours phrase, `{hours}`
    HoursInfo,

    /// Directions prompt, `{name}`
    Directions,

    /// More-options suffix, `{type_activity}` and `{others}`
    MoreOptions,

    /// Suggestion footer
    Suggestions,
}

impl Template {
    /// Every registered phrasing of this family
    pub fn variants(self) -> &'static [&'static str] {
        match self {
            Template::Greeting => &[
                "Salut ! Je suis là pour t'aider à trouver ce que tu cherches 😊",
                "Bonjour ! Dis-moi ce que tu recherches et je vais te trouver les meilleures options !",
                "Hey ! Je suis ton assistant local, que puis-je faire pour toi aujourd'hui ?",
                "Coucou ! Prêt à découvrir les meilleures activités autour de toi ?",
            ],
            Template::Emergency => &[
                "🚨 URGENCE détectée ! Voici les services d'urgence les plus proches :",
                "🚨 Je comprends que c'est urgent ! Voici les options immédiates :",
                "🚨 Situation d'urgence ! Je te trouve les services les plus rapides :",
                "🚨 Urgent ! Voici les lieux qui peuvent t'aider tout de suite :",
            ],
            Template::SingleResult => &[
                "J'ai trouvé le lieu parfait pour toi !",
                "Parfait ! J'ai déniché exactement ce qu'il te faut !",
                "Excellent ! Voici le lieu idéal pour ta demande :",
                "Super ! J'ai trouvé la perle rare !",
            ],
            Template::MultipleResults => &[
                "J'ai trouvé plusieurs options intéressantes pour toi :",
                "Parfait ! Voici plusieurs {type_activity} qui pourraient t'intéresser :",
                "Super ! J'ai déniché {count} {type_activity} de qualité :",
                "Excellent ! Voici mes meilleures trouvailles :",
                "Parfait ! J'ai trouvé {count} {type_activity} qui correspondent à ta recherche :",
                "Génial ! Voici {count} {type_activity} qui vont te plaire :",
            ],
            Template::NoResults => &[
                "Hmm, je n'ai pas trouvé d'activité correspondant à ta recherche dans cette zone. Essaie d'élargir ta recherche ou de changer de mots-clés !",
                "Désolé, aucune activité ne correspond à tes critères pour le moment. Veux-tu que je te suggère des alternatives ?",
                "Oups ! Rien ne correspond exactement à ta demande. Peux-tu reformuler ou élargir ta zone de recherche ?",
                "Je n'ai rien trouvé qui colle parfaitement. Dis-moi ce que tu cherches exactement et je vais mieux t'aider !",
            ],
            Template::DistanceInfo => &[
                "à seulement {distance}",
                "à {distance} de toi",
                "situé(e) à {distance}",
                "à {distance} de ta position",
            ],
            Template::StatusOpen => &[
                "✅ **OUVERT** - Parfait pour y aller maintenant !",
                "✅ **OUVERT** - Tu peux y aller tout de suite !",
                "✅ **OUVERT** - Idéal pour une visite immédiate !",
                "✅ **OUVERT** - Prêt à t'accueillir !",
            ],
            Template::StatusClosed => &[
                "❌ **FERMÉ** - Mais ça vaut le détour !",
                "❌ **FERMÉ** - À retenir pour plus tard !",
                "❌ **FERMÉ** - Mais excellent quand c'est ouvert !",
                "❌ **FERMÉ** - À programmer pour une prochaine fois !",
            ],
            Template::Verified => &[
                "✓ Vérifié {tier} - Tu peux y aller les yeux fermés !",
                "✓ Vérifié {tier} - Qualité garantie !",
                "✓ Vérifié {tier} - Recommandé par la communauté !",
                "✓ Vérifié {tier} - Fiable et de confiance !",
            ],
            Template::Rating => &[
                "⭐ {rating}/5 - Excellent choix !",
                "⭐ {rating}/5 - Très bien noté !",
                "⭐ {rating}/5 - Qualité reconnue !",
                "⭐ {rating}/5 - Apprécié par la communauté !",
            ],
            Template::ContactHeader => &[
                "📇 Pour les contacter :",
                "📇 Voici leurs coordonnées :",
                "📇 Tu peux les joindre ici :",
            ],
            Template::HoursInfo => &[
                "🕒 Horaires: {hours}",
                "🕒 Ouvert: {hours}",
                "🕒 Disponible: {hours}",
                "🕒 Fonctionne: {hours}",
            ],
            Template::Directions => &[
                "🗺️ Veux-tu que je te donne l'itinéraire ?",
                "🗺️ Je peux te guider jusqu'à {name} !",
                "🗺️ Besoin d'aide pour y aller ?",
                "🗺️ Je t'accompagne jusqu'à {name} !",
            ],
            Template::MoreOptions => &[
                "Veux-tu voir les autres options ?",
                "Intéressé(e) par les autres {type_activity} ?",
                "Je peux te montrer les {others} autres !",
                "D'autres {type_activity} t'intéressent ?",
            ],
            Template::Suggestions => &[
                "💡 Basé sur tes recherches, je peux aussi te suggérer des activités similaires !",
                "💡 Je connais d'autres endroits qui pourraient te plaire !",
                "💡 Veux-tu que je te propose des alternatives ?",
                "💡 J'ai d'autres idées qui pourraient t'intéresser !",
            ],
        }
    }

    /// Pick one phrasing uniformly at random
    pub fn phrase<R: Rng + ?Sized>(self, rng: &mut R) -> &'static str {
        self.variants().choose(rng).copied().unwrap_or_default()
    }
}

/// Kind of fragment in a synthesized reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Opening salutation
    Greeting,

    /// How many results were found
    CountStatement,

    /// Top result name
    Name,

    /// Distance to the top result
    Distance,

    /// Category of the top result
    Category,

    /// Open or closed
    Status,

    /// Verification tier
    Verification,

    /// Rating and review count
    Rating,

    /// Price level
    Price,

    /// Contact channels
    ContactBlock,

    /// Opening hours
    HoursBlock,

    /// Directions prompt
    Directions,

    /// Offer to show the other results
    MoreOptions,

    /// Suggestion footer
    Suggestion,

    /// Nothing found
    NoResults,
}

/// One piece of a reply, including its leading separator
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// What the fragment says
    pub slot: Slot,

    /// Rendered text
    pub text: String,
}

impl Fragment {
    fn new(slot: Slot, text: impl Into<String>) -> Self {
        Self {
            slot,
            text: text.into(),
        }
    }
}

/// Response synthesis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Probability of appending the suggestion footer
    pub suggestion_probability: f64,

    /// Open the reply with a greeting
    pub include_greeting: bool,

    /// Fixed RNG seed, for reproducible phrasing
    pub seed: Option<u64>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            suggestion_probability: 0.3,
            include_greeting: false,
            seed: None,
        }
    }
}

/// Inputs of one synthesis
#[derive(Debug, Clone, Copy)]
pub struct SynthesisContext<'a> {
    /// Classified intent
    pub intent: Intent,

    /// Extracted entities
    pub entities: &'a Entities,

    /// Ranked results, best first
    pub results: &'a [RankedResult],
}

/// Builds the natural-language reply
#[derive(Debug, Clone, Default)]
pub struct ResponseSynthesizer {
    config: ResponseConfig,
}

impl ResponseSynthesizer {
    /// Synthesizer with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesizer with custom settings
    pub fn with_config(config: ResponseConfig) -> Self {
        Self { config }
    }

    /// Settings in use
    pub fn config(&self) -> &ResponseConfig {
        &self.config
    }

    /// Render the reply as a single string
    pub fn synthesize<R: Rng + ?Sized>(&self, ctx: &SynthesisContext<'_>, rng: &mut R) -> String {
        self.compose(ctx, rng)
            .into_iter()
            .map(|fragment| fragment.text)
            .collect()
    }

    /// Build the reply fragment by fragment
    pub fn compose<R: Rng + ?Sized>(
        &self,
        ctx: &SynthesisContext<'_>,
        rng: &mut R,
    ) -> Vec<Fragment> {
        let Some(top) = ctx.results.first() else {
            return vec![Fragment::new(Slot::NoResults, Template::NoResults.phrase(rng))];
        };

        let candidate = &top.candidate;
        let place = &candidate.place;
        let count = ctx.results.len();
        let type_activity = type_activity(ctx.entities, candidate.category_name.as_deref());
        let mut fragments = Vec::new();

        if self.config.include_greeting {
            fragments.push(Fragment::new(
                Slot::Greeting,
                format!("{}\n\n", Template::Greeting.phrase(rng)),
            ));
        }

        let family = if ctx.intent == Intent::Emergency {
            Template::Emergency
        } else if count == 1 {
            Template::SingleResult
        } else {
            Template::MultipleResults
        };
        fragments.push(Fragment::new(
            Slot::CountStatement,
            fill(family.phrase(rng), &[
                ("{count}", count.to_string()),
                ("{type_activity}", type_activity.clone()),
            ]),
        ));

        fragments.push(Fragment::new(Slot::Name, format!("\n\n**{}**", place.name)));

        if let Some(meters) = candidate.distance {
            fragments.push(Fragment::new(
                Slot::Distance,
                format!(
                    " {}",
                    fill(
                        Template::DistanceInfo.phrase(rng),
                        &[("{distance}", format_distance(meters))]
                    )
                ),
            ));
        }

        if let Some(category) = candidate.category_name.as_deref() {
            if category.to_lowercase() != type_activity {
                fragments.push(Fragment::new(Slot::Category, format!(" ({category})")));
            }
        }

        let status = if place.is_open {
            Template::StatusOpen
        } else {
            Template::StatusClosed
        };
        fragments.push(Fragment::new(Slot::Status, format!("\n{}", status.phrase(rng))));

        if place.is_verified {
            fragments.push(Fragment::new(
                Slot::Verification,
                format!(
                    "\n{}",
                    fill(Template::Verified.phrase(rng), &[(
                        "{tier}",
                        verification_tier(place.verification_level).to_string()
                    )])
                ),
            ));
        }

        if place.rating > 0.0 {
            let mut text = format!(
                "\n{}",
                fill(Template::Rating.phrase(rng), &[("{rating}", format!("{:.1}", place.rating))])
            );
            if place.review_count > 0 {
                text.push_str(&format!(" ({} avis)", place.review_count));
            }
            fragments.push(Fragment::new(Slot::Rating, text));
        }

        if let Some(level) = place.price_level.filter(|l| *l > 0) {
            fragments.push(Fragment::new(
                Slot::Price,
                format!("\n💰 {}", "€".repeat(usize::from(level))),
            ));
        }

        if wants(ctx, Intent::AskContact, EntityKind::ContactChannel)
            && place.has_contact_channel()
        {
            let lines: Vec<String> = [
                ("📞 Téléphone", &place.phone_number),
                ("💬 WhatsApp", &place.whatsapp_number),
                ("📧 Email", &place.email),
                ("🌐 Site web", &place.website),
            ]
            .iter()
            .filter_map(|(label, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| format!("{label}: {v}"))
            })
            .collect();
            fragments.push(Fragment::new(
                Slot::ContactBlock,
                format!("\n\n{}\n{}", Template::ContactHeader.phrase(rng), lines.join("\n")),
            ));
        }

        if wants(ctx, Intent::AskHours, EntityKind::HoursRequest) && place.has_opening_hours() {
            let hours = format_hours(place.opening_hours.as_ref());
            fragments.push(Fragment::new(
                Slot::HoursBlock,
                format!("\n\n{}", fill(Template::HoursInfo.phrase(rng), &[("{hours}", hours)])),
            ));
        }

        if wants(ctx, Intent::AskDirections, EntityKind::DirectionsRequest) {
            fragments.push(Fragment::new(
                Slot::Directions,
                format!(
                    "\n\n{}",
                    fill(Template::Directions.phrase(rng), &[("{name}", place.name.clone())])
                ),
            ));
        }

        if count > 1 {
            fragments.push(Fragment::new(
                Slot::MoreOptions,
                format!(
                    "\n\n{}",
                    fill(Template::MoreOptions.phrase(rng), &[
                        ("{type_activity}", type_activity.clone()),
                        ("{others}", (count - 1).to_string()),
                    ])
                ),
            ));
        }

        let p = self.config.suggestion_probability;
        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        if rng.gen_bool(p) {
            fragments.push(Fragment::new(
                Slot::Suggestion,
                format!("\n\n{}", Template::Suggestions.phrase(rng)),
            ));
        }

        fragments
    }
}

fn wants(ctx: &SynthesisContext<'_>, intent: Intent, entity: EntityKind) -> bool {
    ctx.intent == intent || ctx.entities.contains_key(&entity)
}

/// What the user asked for, in the words used by the count statement
fn type_activity(entities: &Entities, category: Option<&str>) -> String {
    entities
        .get(&EntityKind::ServiceType)
        .or_else(|| entities.get(&EntityKind::FoodItem))
        .cloned()
        .or_else(|| category.map(str::to_lowercase))
        .unwrap_or_else(|| "lieux".to_string())
}

fn fill(template: &str, values: &[(&str, String)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (key, value)| text.replace(key, value))
}

/// "350m" under a kilometer, "1.2km" beyond
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.trunc() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// Label of a verification level
pub fn verification_tier(level: u8) -> &'static str {
    match level {
        0 | 1 => "Basique",
        2 => "Complet",
        _ => "Premium",
    }
}

fn format_hours(hours: Option<&serde_json::Value>) -> String {
    match hours {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(serde_json::Value::Object(map)) => map
            .get("today")
            .and_then(|today| today.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| "Non spécifié".to_string()),
        _ => "Non spécifié".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::{Candidate, Place};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ranked(place: Place, distance: Option<f64>) -> RankedResult {
        let mut candidate = Candidate::new(place).with_category("Restaurant");
        candidate.distance = distance;
        RankedResult {
            candidate,
            relevance_score: 100.0,
        }
    }

    fn sample_place() -> Place {
        let mut place = Place::new(1, "Chez Tante Adjo", 6.17, 1.23);
        place.rating = 4.5;
        place.review_count = 12;
        place.is_verified = true;
        place.verification_level = 2;
        place.price_level = Some(1);
        place.phone_number = Some("+228 90 12 34 56".to_string());
        place.opening_hours = Some(serde_json::json!({"today": "11h-23h"}));
        place
    }

    fn slots(fragments: &[Fragment]) -> Vec<Slot> {
        fragments.iter().map(|f| f.slot).collect()
    }

    #[test]
    fn test_no_results_is_a_registered_template() {
        let synthesizer = ResponseSynthesizer::new();
        let entities = Entities::new();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let ctx = SynthesisContext {
                intent: Intent::SearchPlace,
                entities: &entities,
                results: &[],
            };
            let text = synthesizer.synthesize(&ctx, &mut rng);
            assert!(Template::NoResults.variants().contains(&text.as_str()));
        }
    }

    #[test]
    fn test_facts_do_not_depend_on_phrasing() {
        let synthesizer = ResponseSynthesizer::new();
        let mut entities = Entities::new();
        entities.insert(EntityKind::ContactChannel, "téléphone".to_string());
        let results = vec![ranked(sample_place(), Some(350.7))];

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let ctx = SynthesisContext {
                intent: Intent::SearchPlace,
                entities: &entities,
                results: &results,
            };
            let text = synthesizer.synthesize(&ctx, &mut rng);
            assert!(text.contains("**Chez Tante Adjo**"), "{text}");
            assert!(text.contains("350m"), "{text}");
            assert!(text.contains("4.5/5"), "{text}");
            assert!(text.contains("(12 avis)"), "{text}");
            assert!(text.contains("**OUVERT**"), "{text}");
            assert!(text.contains("Complet"), "{text}");
            assert!(text.contains("📞 Téléphone: +228 90 12 34 56"), "{text}");
            assert!(text.contains("€"), "{text}");
        }
    }

    #[test]
    fn test_single_result_has_no_more_options() {
        let synthesizer = ResponseSynthesizer::new();
        let entities = Entities::new();
        let results = vec![ranked(sample_place(), Some(100.0))];

        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            let ctx = SynthesisContext {
                intent: Intent::SearchPlace,
                entities: &entities,
                results: &results,
            };
            let fragments = synthesizer.compose(&ctx, &mut rng);
            assert!(!slots(&fragments).contains(&Slot::MoreOptions));
        }
    }

    #[test]
    fn test_multiple_results_offer_more_options() {
        let synthesizer = ResponseSynthesizer::with_config(ResponseConfig {
            suggestion_probability: 0.0,
            ..Default::default()
        });
        let entities = Entities::new();
        let results = vec![
            ranked(sample_place(), Some(100.0)),
            ranked(Place::new(2, "Maquis du Coin", 6.17, 1.23), Some(900.0)),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let ctx = SynthesisContext {
            intent: Intent::SearchPlace,
            entities: &entities,
            results: &results,
        };
        let fragments = synthesizer.compose(&ctx, &mut rng);
        assert_eq!(fragments.last().map(|f| f.slot), Some(Slot::MoreOptions));
    }

    #[test]
    fn test_conditional_blocks() {
        let synthesizer = ResponseSynthesizer::with_config(ResponseConfig {
            suggestion_probability: 0.0,
            ..Default::default()
        });
        let results = vec![ranked(sample_place(), None)];
        let mut rng = StdRng::seed_from_u64(1);

        let plain = Entities::new();
        let ctx = SynthesisContext {
            intent: Intent::SearchPlace,
            entities: &plain,
            results: &results,
        };
        let fragments = slots(&synthesizer.compose(&ctx, &mut rng));
        assert!(!fragments.contains(&Slot::ContactBlock));
        assert!(!fragments.contains(&Slot::HoursBlock));
        assert!(!fragments.contains(&Slot::Directions));
        assert!(!fragments.contains(&Slot::Distance));

        let ctx = SynthesisContext {
            intent: Intent::AskHours,
            entities: &plain,
            results: &results,
        };
        let composed = synthesizer.compose(&ctx, &mut rng);
        let hours = composed
            .iter()
            .find(|f| f.slot == Slot::HoursBlock)
            .map(|f| f.text.clone())
            .unwrap_or_default();
        assert!(hours.contains("11h-23h"));

        let mut directions = Entities::new();
        directions.insert(EntityKind::DirectionsRequest, "itinéraire".to_string());
        let ctx = SynthesisContext {
            intent: Intent::SearchPlace,
            entities: &directions,
            results: &results,
        };
        assert!(slots(&synthesizer.compose(&ctx, &mut rng)).contains(&Slot::Directions));
    }

    #[test]
    fn test_emergency_family() {
        let synthesizer = ResponseSynthesizer::new();
        let entities = Entities::new();
        let results = vec![ranked(sample_place(), Some(1200.0))];
        let mut rng = StdRng::seed_from_u64(3);
        let ctx = SynthesisContext {
            intent: Intent::Emergency,
            entities: &entities,
            results: &results,
        };
        let text = synthesizer.synthesize(&ctx, &mut rng);
        assert!(text.starts_with("🚨"));
        assert!(text.contains("1.2km"));
    }

    #[test]
    fn test_greeting_is_opt_in() {
        let synthesizer = ResponseSynthesizer::with_config(ResponseConfig {
            include_greeting: true,
            ..Default::default()
        });
        let entities = Entities::new();
        let results = vec![ranked(sample_place(), None)];
        let mut rng = StdRng::seed_from_u64(11);
        let ctx = SynthesisContext {
            intent: Intent::SearchPlace,
            entities: &entities,
            results: &results,
        };
        let fragments = synthesizer.compose(&ctx, &mut rng);
        assert_eq!(fragments[0].slot, Slot::Greeting);
    }

    #[test]
    fn test_suggestion_footer_always_with_probability_one() {
        let synthesizer = ResponseSynthesizer::with_config(ResponseConfig {
            suggestion_probability: 1.0,
            ..Default::default()
        });
        let entities = Entities::new();
        let results = vec![ranked(sample_place(), None)];
        let mut rng = StdRng::seed_from_u64(5);
        let ctx = SynthesisContext {
            intent: Intent::SearchPlace,
            entities: &entities,
            results: &results,
        };
        let fragments = synthesizer.compose(&ctx, &mut rng);
        assert_eq!(fragments.last().map(|f| f.slot), Some(Slot::Suggestion));
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.0), "0m");
        assert_eq!(format_distance(999.9), "999m");
        assert_eq!(format_distance(1000.0), "1.0km");
        assert_eq!(format_distance(4567.0), "4.6km");
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(Some(&serde_json::json!("24h/24"))), "24h/24");
        assert_eq!(
            format_hours(Some(&serde_json::json!({"lundi": "8h-18h"}))),
            "Non spécifié"
        );
        assert_eq!(format_hours(None), "Non spécifié");
    }
}
