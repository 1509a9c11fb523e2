//! Example: a word list lookup tool on top of the trie.
//!
//! Builds a trie from the file given as the first argument (one word per
//! line), or from a small built-in list, then shows lookups, completions,
//! prefix matches and the size of the compressed encoding.
//!
//! Run with: cargo run --example wordlist [words.txt]

use owtrie::codec::{init_brotli, BrotliConfig};
use owtrie::{build_trie, build_trie_from_file, FormatVersion, Trie, TrieConfig};

fn load() -> owtrie::Result<Trie> {
    match std::env::args().nth(1) {
        Some(path) => build_trie_from_file(path, TrieConfig::default()),
        None => build_trie([
            "BAKE", "BAKED", "BAKER", "BAKERY", "CAKE", "CAKED", "FAKE", "LAKE", "LAKESIDE",
        ]),
    }
}

fn main() -> owtrie::Result<()> {
    let trie = load()?;

    println!("Word lookup:");
    for word in ["BAKE", "BAKER", "BAKES", "CAKE", "LAKE", "MAKE"] {
        match trie.word_id(word) {
            Some(id) => println!("  {word}: yes (id {id})"),
            None => println!("  {word}: no"),
        }
    }

    println!("\nCompletions:");
    for prefix in ["BA", "CAK", "MA", "LAKES"] {
        println!("  {prefix}*: {:?}", trie.keys_with_prefix(prefix, Some(5)));
    }

    println!("\nWords that start \"BAKERYSHOP\":");
    for (word, id) in trie.common_prefixes("BAKERYSHOP") {
        println!("  {word} (id {id})");
    }

    init_brotli(BrotliConfig::default())?;
    let compressed = trie.to_bytes(FormatVersion::V8)?;
    let reloaded = Trie::from_bytes(&compressed)?;
    assert_eq!(reloaded.len(), trie.len());

    println!("\n{}", trie.stats()?);
    println!("v8 bytes:     {}", compressed.len());
    Ok(())
}
