//! Theme word lists used to validate secret words and to draw spy words.
//!
//! Lists are embedded by default. When a word-list directory is configured,
//! each theme is loaded from `<dir>/<theme>.txt` (one word per line); a theme
//! whose file cannot be read is left unregistered so submissions against it
//! fail closed.

use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::types::Theme;

/// Contract every theme collaborator exposes
pub trait WordValidator: Send + Sync {
    fn is_valid(&self, word: &str) -> bool;

    /// Candidate words for random draws (spy word, ghost challenge)
    fn words(&self) -> &[String];
}

/// A fixed list of lowercase words
#[derive(Debug, Clone)]
pub struct WordList {
    words: Vec<String>,
    index: HashSet<String>,
}

impl WordList {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = HashSet::new();
        let mut list = Vec::new();
        for word in words {
            let word = word.as_ref().trim().to_lowercase();
            if word.is_empty() || word.starts_with('#') {
                continue;
            }
            if index.insert(word.clone()) {
                list.push(word);
            }
        }
        Self { words: list, index }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::new(contents.lines()))
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl WordValidator for WordList {
    fn is_valid(&self, word: &str) -> bool {
        self.index.contains(&word.trim().to_lowercase())
    }

    fn words(&self) -> &[String] {
        &self.words
    }
}

/// Registered theme validators plus the generic fallback list
#[derive(Clone)]
pub struct ThemeRegistry {
    themes: HashMap<Theme, Arc<dyn WordValidator>>,
    generic: Arc<dyn WordValidator>,
}

impl ThemeRegistry {
    /// Registry backed by the embedded lists
    pub fn builtin() -> Self {
        let themes = Theme::ALL
            .iter()
            .map(|theme| {
                let list: Arc<dyn WordValidator> = Arc::new(WordList::new(builtin_words(*theme)));
                (*theme, list)
            })
            .collect();
        Self {
            themes,
            generic: Arc::new(WordList::new(GENERIC_WORDS)),
        }
    }

    /// Registry with no themes at all; every themed submission fails closed
    pub fn empty() -> Self {
        Self {
            themes: HashMap::new(),
            generic: Arc::new(WordList::new(GENERIC_WORDS)),
        }
    }

    /// Load `<dir>/<theme>.txt` for every theme
    pub fn from_dir(dir: &Path) -> Self {
        let mut registry = Self::empty();
        for theme in Theme::ALL {
            let path = dir.join(format!("{}.txt", theme.as_str()));
            match WordList::load(&path) {
                Ok(list) if !list.is_empty() => {
                    tracing::info!(theme = theme.as_str(), words = list.words().len(), "Loaded word list");
                    registry.register(theme, Arc::new(list));
                }
                Ok(_) => tracing::warn!("Word list {} is empty, theme disabled", path.display()),
                Err(e) => tracing::warn!("Failed to load word list {}: {}", path.display(), e),
            }
        }
        let generic_path = dir.join("generic.txt");
        if let Ok(list) = WordList::load(&generic_path) {
            if !list.is_empty() {
                registry.generic = Arc::new(list);
            }
        }
        registry
    }

    pub fn register(&mut self, theme: Theme, validator: Arc<dyn WordValidator>) {
        self.themes.insert(theme, validator);
    }

    pub fn get(&self, theme: Theme) -> Option<&Arc<dyn WordValidator>> {
        self.themes.get(&theme)
    }

    /// Draw a word from the theme when given and available, else from the generic list
    pub fn random_word<R: Rng + ?Sized>(&self, theme: Option<Theme>, rng: &mut R) -> String {
        let source = theme
            .and_then(|t| self.themes.get(&t))
            .filter(|v| !v.words().is_empty())
            .unwrap_or(&self.generic);
        source
            .words()
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| "word".to_string())
    }
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_words(theme: Theme) -> &'static [&'static str] {
    match theme {
        Theme::Animals => ANIMALS,
        Theme::Colours => COLOURS,
        Theme::Elements => ELEMENTS,
        Theme::Countries => COUNTRIES,
        Theme::Occupations => OCCUPATIONS,
        Theme::Instruments => INSTRUMENTS,
    }
}

const ANIMALS: &[&str] = &[
    "ant", "ape", "bat", "bear", "beaver", "bee", "bison", "boar", "camel", "cat", "cheetah",
    "chicken", "cobra", "cow", "crab", "crow", "deer", "dog", "dolphin", "donkey", "duck",
    "eagle", "eel", "elephant", "elk", "falcon", "ferret", "fox", "frog", "gecko", "giraffe",
    "goat", "goose", "gorilla", "hamster", "hare", "hawk", "hedgehog", "heron", "horse",
    "hyena", "iguana", "jaguar", "kangaroo", "koala", "lemur", "leopard", "lion", "llama",
    "lobster", "lynx", "mole", "monkey", "moose", "mouse", "newt", "octopus", "otter", "owl",
    "ox", "panda", "parrot", "penguin", "pig", "pigeon", "puma", "rabbit", "raccoon", "rat",
    "raven", "rhino", "salmon", "seal", "shark", "sheep", "skunk", "sloth", "snail", "snake",
    "spider", "squid", "squirrel", "swan", "tiger", "toad", "trout", "turkey", "turtle",
    "walrus", "wasp", "weasel", "whale", "wolf", "wombat", "yak", "zebra",
];

const COLOURS: &[&str] = &[
    "amber", "aqua", "azure", "beige", "black", "blue", "bronze", "brown", "coral", "crimson",
    "cyan", "gold", "gray", "green", "grey", "indigo", "ivory", "khaki", "lavender", "lemon",
    "lilac", "lime", "magenta", "maroon", "mauve", "navy", "ochre", "olive", "orange", "peach",
    "pink", "plum", "purple", "red", "ruby", "rust", "salmon", "scarlet", "silver", "tan",
    "teal", "turquoise", "violet", "white", "yellow",
];

const ELEMENTS: &[&str] = &[
    "aluminium", "argon", "arsenic", "barium", "boron", "bromine", "calcium", "carbon",
    "chlorine", "chromium", "cobalt", "copper", "fluorine", "gold", "helium", "hydrogen",
    "iodine", "iron", "krypton", "lead", "lithium", "magnesium", "mercury", "neon", "nickel",
    "nitrogen", "oxygen", "phosphorus", "platinum", "plutonium", "potassium", "radium",
    "radon", "silicon", "silver", "sodium", "sulfur", "tin", "titanium", "tungsten",
    "uranium", "xenon", "zinc",
];

const COUNTRIES: &[&str] = &[
    "albania", "algeria", "angola", "argentina", "australia", "austria", "belgium", "bolivia",
    "brazil", "bulgaria", "canada", "chad", "chile", "china", "colombia", "cuba", "cyprus",
    "denmark", "egypt", "estonia", "ethiopia", "fiji", "finland", "france", "germany", "ghana",
    "greece", "haiti", "hungary", "iceland", "india", "iran", "iraq", "ireland", "israel",
    "italy", "jamaica", "japan", "kenya", "laos", "latvia", "libya", "mali", "malta",
    "mexico", "morocco", "nepal", "niger", "nigeria", "norway", "oman", "panama", "peru",
    "poland", "portugal", "qatar", "romania", "russia", "rwanda", "senegal", "serbia", "spain",
    "sweden", "syria", "togo", "tonga", "tunisia", "turkey", "uganda", "ukraine", "uruguay",
    "vietnam", "yemen", "zambia", "zimbabwe",
];

const OCCUPATIONS: &[&str] = &[
    "actor", "architect", "artist", "baker", "banker", "barber", "builder", "butcher", "chef",
    "chemist", "clerk", "coach", "cook", "dancer", "dentist", "designer", "doctor", "driver",
    "editor", "engineer", "farmer", "firefighter", "gardener", "guard", "judge", "lawyer",
    "librarian", "mechanic", "miner", "musician", "nurse", "painter", "pilot", "plumber",
    "poet", "police", "potter", "priest", "sailor", "scientist", "singer", "soldier",
    "surgeon", "tailor", "teacher", "writer",
];

const INSTRUMENTS: &[&str] = &[
    "accordion", "bagpipes", "banjo", "bassoon", "bell", "bongo", "cello", "clarinet",
    "cymbal", "drum", "flute", "gong", "guitar", "harmonica", "harp", "harpsichord", "horn",
    "kazoo", "lute", "lyre", "mandolin", "marimba", "oboe", "organ", "piano", "piccolo",
    "recorder", "saxophone", "sitar", "tambourine", "triangle", "trombone", "trumpet",
    "tuba", "ukulele", "viola", "violin", "xylophone", "zither",
];

const GENERIC_WORDS: &[&str] = &[
    "airport", "anchor", "apple", "backpack", "balloon", "beach", "bicycle", "blanket",
    "bridge", "camera", "candle", "castle", "circus", "cloud", "compass", "desert", "diamond",
    "engine", "forest", "garden", "glacier", "hammer", "island", "jungle", "kitchen", "ladder",
    "library", "lighthouse", "magnet", "market", "mirror", "mountain", "museum", "pencil",
    "pirate", "planet", "pyramid", "rainbow", "robot", "rocket", "school", "station",
    "subway", "telescope", "theater", "tunnel", "umbrella", "volcano", "waterfall", "window",
];
