//! Deterministic human-readable key IDs.
//!
//! A key ID is derived from a PKIX-encoded public key by seeding
//! HKDF-SHA256 with the key bytes and mapping each output byte to a word
//! from a fixed list. The same key always produces the same ID, so the ID
//! can be exchanged out of band (read over the phone, pasted into a
//! config) and later recomputed for comparison.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::KeyIdError;

/// Number of words in a key ID.
pub const KEY_ID_NUM_WORDS: usize = 8;

/// Derive the key ID for a PKIX-encoded public key.
pub fn key_id_from_pkix(pkix_key: &[u8]) -> Result<String, KeyIdError> {
    if pkix_key.is_empty() {
        return Err(KeyIdError::EmptyKey);
    }

    // The key bytes seed every hkdf input, matching the derivation the
    // rest of the fleet performs
    let hk = Hkdf::<Sha256>::new(Some(pkix_key), pkix_key);
    let mut okm = [0u8; KEY_ID_NUM_WORDS];
    hk.expand(pkix_key, &mut okm)
        .map_err(|e| KeyIdError::Derivation(e.to_string()))?;

    let words: Vec<&str> = okm.iter().map(|b| WORDS[*b as usize]).collect();
    Ok(words.join("-"))
}

// One word per byte value.
const WORDS: [&str; 256] = [
    "acorn", "alder", "amber", "anchor", "angle", "ankle", "apple", "apron", "arch", "arrow",
    "aspen", "atlas", "attic", "autumn", "axle", "azure", "badge", "bagel", "bamboo", "banjo",
    "barley", "basil", "beacon", "beam", "birch", "bison", "blaze", "bloom", "bolt", "bonus",
    "brook", "bugle", "cabin", "cactus", "camel", "canoe", "canyon", "carbon", "cedar", "cello",
    "chalk", "cherry", "cider", "cliff", "clover", "cobalt", "comet", "coral", "cove", "crane",
    "crater", "cress", "crow", "cumin", "daisy", "dawn", "delta", "denim", "dome", "drift",
    "dune", "eagle", "easel", "ebony", "echo", "elder", "elm", "ember", "epoch", "fable",
    "falcon", "fennel", "fern", "fig", "finch", "fjord", "flint", "ferry", "fossil", "frost",
    "gale", "garnet", "gecko", "geyser", "ginger", "glade", "glen", "gorge", "gourd", "grove",
    "gull", "gust", "hazel", "heron", "holly", "harbor", "ibis", "icicle", "indigo", "inlet",
    "iris", "ivory", "ivy", "jade", "jasper", "jetty", "juniper", "kayak", "kelp", "kestrel",
    "kiwi", "knoll", "lagoon", "lantern", "larch", "lark", "laurel", "lava", "lemon", "lilac",
    "lily", "linen", "lotus", "lunar", "lupine", "lynx", "magma", "mango", "maple", "marble",
    "marsh", "mason", "meadow", "melon", "mesa", "mica", "mint", "morel", "moss", "mural",
    "myrtle", "nectar", "nettle", "newt", "north", "nougat", "nutmeg", "oasis", "ocean", "ochre",
    "olive", "onyx", "opal", "orbit", "orchid", "oriole", "osprey", "otter", "owl", "oxide",
    "palm", "pampas", "pansy", "papaya", "pebble", "pecan", "peony", "pepper", "perch", "pine",
    "plume", "polar", "pollen", "poplar", "prairie", "prism", "quail", "quartz", "quill",
    "quince", "raven", "reed", "ridge", "river", "robin", "rook", "rosin", "rowan", "ruby",
    "rune", "rust", "rye", "saffron", "sage", "salmon", "sandal", "sapling", "scarab", "sequoia",
    "shale", "shore", "sierra", "silver", "sleet", "sorrel", "spruce", "squall", "stone",
    "summit", "sumac", "swan", "talon", "teak", "thistle", "thorn", "tidal", "tiger", "timber",
    "topaz", "trout", "tulip", "tundra", "turnip", "tusk", "umber", "upland", "valley", "vapor",
    "velvet", "verge", "vessel", "vine", "violet", "vista", "walnut", "walrus", "warden",
    "water", "weasel", "wharf", "wheat", "willow", "winter", "wisp", "wolf", "wren", "yarrow",
    "yew", "yonder", "yucca", "zebra", "zenith", "zephyr", "zinc", "zinnia", "zircon",
];
