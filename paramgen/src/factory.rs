// Generator registry and composition factory.
//
// The registry is a process-wide, read-only table built once on first use:
// each entry carries the canonical name, its acronyms, the argument signature,
// and a constructor function. Lookup is case-insensitive on either the name or
// an acronym.
//
// The `Factory` turns literals into `Pmtr` trees. It owns the configuration
// and the master `SeededRng`; every generator that draws random numbers gets
// its own stream forked from the master while it is being constructed, so two
// factories with the same seed build generators with identical output.
// Construction recurses through nested generator literals; nesting deeper
// than `GeneratorConfig::max_depth` fails with `PmtrError::TooDeep`.

use std::collections::HashMap;
use std::sync::OnceLock;

use paramgen_prng::SeededRng;
use tracing::debug;

use crate::args::{Arg, ArgKind, ArgSpec, Args, is_generator_literal, kind_accepts};
use crate::config::GeneratorConfig;
use crate::error::{PmtrError, SyntaxKind};
use crate::generator::{Generator, Pmtr};
use crate::generators;
use crate::literal::Literal;
use crate::value::Value;

/// What a constructor gets besides its arguments.
pub struct BuildEnv<'a> {
    config: &'a GeneratorConfig,
    rng: &'a mut SeededRng,
}

impl BuildEnv<'_> {
    pub fn config(&self) -> &GeneratorConfig {
        self.config
    }

    /// A fresh random stream for the generator under construction.
    pub fn fork_rng(&mut self) -> SeededRng {
        self.rng.fork()
    }
}

pub type Constructor = fn(&mut Args, &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError>;

/// One registered generator type.
pub struct GeneratorEntry {
    pub name: &'static str,
    pub acronyms: &'static [&'static str],
    pub signature: &'static [ArgSpec],
    pub build: Constructor,
}

/// Lookup table of every generator type.
pub struct Registry {
    entries: Vec<GeneratorEntry>,
    index: HashMap<String, usize>,
}

impl Registry {
    fn new(entries: Vec<GeneratorEntry>) -> Self {
        let mut index = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            index.insert(entry.name.to_ascii_lowercase(), i);
            for acronym in entry.acronyms {
                index.insert(acronym.to_ascii_lowercase(), i);
            }
        }
        Self { entries, index }
    }

    /// Find a type by name or acronym, any case.
    pub fn lookup(&self, tag: &str) -> Option<&GeneratorEntry> {
        self.index
            .get(&tag.trim().to_ascii_lowercase())
            .map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[GeneratorEntry] {
        &self.entries
    }
}

/// The process-wide registry.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new(generators::entries()))
}

/// Builds generator trees from literals.
pub struct Factory {
    config: GeneratorConfig,
    rng: SeededRng,
}

impl Factory {
    pub fn new(seed: u64) -> Self {
        Self::with_config(GeneratorConfig::default(), seed)
    }

    pub fn with_config(config: GeneratorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SeededRng::new(seed),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Build from a full literal such as `ru, 0, (c, 4)` or `(ru, 0, 1)`.
    pub fn build(&mut self, text: &str) -> Result<Pmtr, PmtrError> {
        let mut items = Literal::parse_items(text)?;
        let literal = if items.len() == 1 && matches!(items[0], Literal::List(_)) {
            items.remove(0)
        } else {
            Literal::List(items)
        };
        self.build_literal(&literal)
    }

    /// Build from a type tag and an argument-list literal.
    pub fn construct(&mut self, tag: &str, args: &str) -> Result<Pmtr, PmtrError> {
        let items = Literal::parse_items(args)?;
        self.construct_at(tag, &items, 0)
    }

    pub fn build_literal(&mut self, literal: &Literal) -> Result<Pmtr, PmtrError> {
        self.build_at(literal, 0)
    }

    /// Build, then run the recursive semantic check; a validation failure
    /// is reported as a value error.
    pub fn build_checked(&mut self, text: &str) -> Result<Pmtr, PmtrError> {
        let pmtr = self.build(text)?;
        pmtr.check_args()
            .map_err(|failure| PmtrError::value(failure.tag, failure.message))?;
        Ok(pmtr)
    }

    fn build_at(&mut self, literal: &Literal, depth: usize) -> Result<Pmtr, PmtrError> {
        match literal {
            Literal::Str(tag) => self.construct_at(tag, &[], depth),
            Literal::List(items) => match items.split_first() {
                Some((Literal::Str(tag), rest)) => self.construct_at(tag, rest, depth),
                _ => Err(PmtrError::syntax(
                    SyntaxKind::Literal,
                    literal.to_string(),
                    "a generator literal starts with a type name",
                )),
            },
            Literal::Num(_) => Err(PmtrError::syntax(
                SyntaxKind::Literal,
                literal.to_string(),
                "a generator literal starts with a type name",
            )),
        }
    }

    fn construct_at(&mut self, tag: &str, items: &[Literal], depth: usize) -> Result<Pmtr, PmtrError> {
        if depth > self.config.max_depth {
            return Err(PmtrError::TooDeep {
                depth: self.config.max_depth,
            });
        }
        let entry = registry().lookup(tag).ok_or_else(|| PmtrError::UnknownType {
            tag: tag.trim().to_string(),
        })?;
        let signature = entry.signature;
        if items.len() > signature.len() {
            return Err(PmtrError::ArgCount {
                tag: entry.name.to_string(),
                expected: signature.len(),
                found: items.len(),
            });
        }

        // Shape pass over supplied literals and defaults; nothing is built.
        let mut literals = Vec::with_capacity(signature.len());
        for (i, spec) in signature.iter().enumerate() {
            let literal = match items.get(i) {
                Some(lit) => lit.clone(),
                None => Literal::parse(spec.default)?,
            };
            if !kind_accepts(spec.kind, &literal) {
                return Err(PmtrError::ArgType {
                    tag: entry.name.to_string(),
                    position: i + 1,
                    found: literal.kind_name().to_string(),
                    expected: spec.kind.name().to_string(),
                });
            }
            literals.push(literal);
        }

        let mut args = Args::new(entry.name);
        for (i, (spec, literal)) in signature.iter().zip(&literals).enumerate() {
            let arg = self.resolve(entry.name, i + 1, spec, literal, depth)?;
            args.push(arg);
        }

        let mut env = BuildEnv {
            config: &self.config,
            rng: &mut self.rng,
        };
        let generator = (entry.build)(&mut args, &mut env)?;
        debug!(generator = entry.name, depth, "constructed");
        Ok(Pmtr::new(generator))
    }

    fn resolve(
        &mut self,
        tag: &str,
        position: usize,
        spec: &ArgSpec,
        literal: &Literal,
        depth: usize,
    ) -> Result<Arg, PmtrError> {
        Ok(match (spec.kind, literal) {
            (ArgKind::Str | ArgKind::StrOrNum | ArgKind::StrOrList, Literal::Str(s)) => Arg::Str(s.clone()),
            (
                ArgKind::Str | ArgKind::StrOrNum | ArgKind::StrOrList | ArgKind::Num | ArgKind::Int,
                Literal::Num(n),
            ) => Arg::Num(*n),
            (ArgKind::NumList | ArgKind::StrOrList, Literal::List(items)) => {
                Arg::List(items.iter().filter_map(Literal::to_value).collect())
            }
            (ArgKind::NumOrGen, Literal::Num(n)) => {
                let constant = Literal::List(vec![Literal::Str("constant".into()), Literal::Num(*n)]);
                Arg::Gen(Some(self.build_at(&constant, depth + 1)?))
            }
            (ArgKind::NumOrGen, Literal::Str(word)) if registry().lookup(word).is_none() => {
                let constant = Literal::List(vec![Literal::Str("constant".into()), literal.clone()]);
                Arg::Gen(Some(self.build_at(&constant, depth + 1)?))
            }
            (ArgKind::Gen | ArgKind::NumOrGen, lit) if is_generator_literal(lit) => {
                Arg::Gen(Some(self.build_at(lit, depth + 1)?))
            }
            (ArgKind::GenList, Literal::List(items)) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    list.push(self.build_at(item, depth + 1)?);
                }
                Arg::Gens(Some(list))
            }
            _ => {
                return Err(PmtrError::ArgType {
                    tag: tag.to_string(),
                    position,
                    found: literal.kind_name().to_string(),
                    expected: spec.kind.name().to_string(),
                });
            }
        })
    }
}

/// Shorthand used by constructors that accept a fixed string vocabulary.
pub fn string_choice<'a>(
    tag: &str,
    text: &str,
    choices: &'a [(&'a str, &'a [&'a str])],
) -> Result<&'a str, PmtrError> {
    let key = text.trim().to_ascii_lowercase();
    choices
        .iter()
        .find(|(name, aliases)| name.to_ascii_lowercase() == key || aliases.contains(&key.as_str()))
        .map(|(name, _)| *name)
        .ok_or_else(|| PmtrError::value(tag, format!("'{text}' is not one of the accepted options")))
}

/// Value of a constant sub-generator as a number, if it is one.
pub fn constant_num(pmtr: &Pmtr) -> Option<f64> {
    pmtr.constant_value().as_ref().and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::DescribeMode;
    use crate::value::Context;

    #[test]
    fn lookup_is_case_insensitive_on_names_and_acronyms() {
        let reg = registry();
        assert_eq!(reg.lookup("RU").map(|e| e.name), Some("randomUniform"));
        assert_eq!(reg.lookup("randomuniform").map(|e| e.name), Some("randomUniform"));
        assert!(reg.lookup("nope").is_none());
    }

    #[test]
    fn registry_names_and_acronyms_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for entry in registry().entries() {
            assert!(seen.insert(entry.name.to_ascii_lowercase()), "duplicate {}", entry.name);
            for acronym in entry.acronyms {
                assert!(seen.insert(acronym.to_ascii_lowercase()), "duplicate {acronym}");
            }
        }
    }

    #[test]
    fn every_registered_type_builds_from_defaults() {
        let mut factory = Factory::new(1);
        let ctx = Context::new();
        for entry in registry().entries() {
            let mut pmtr = factory
                .construct(entry.name, "")
                .unwrap_or_else(|e| panic!("{} failed to build from defaults: {e}", entry.name));
            pmtr.produce(0, &ctx);
            let text = pmtr.describe(DescribeMode::Full);
            let again = factory
                .build(&text)
                .unwrap_or_else(|e| panic!("{} description did not rebuild: {text}: {e}", entry.name));
            assert_eq!(again.describe(DescribeMode::Full), text);
        }
    }

    #[test]
    fn unknown_type_is_reported() {
        let mut factory = Factory::new(0);
        assert!(matches!(
            factory.build("noSuchThing, 1"),
            Err(PmtrError::UnknownType { tag }) if tag == "noSuchThing"
        ));
    }

    #[test]
    fn too_many_arguments() {
        let mut factory = Factory::new(0);
        match factory.build("c, 1, 2") {
            Err(PmtrError::ArgCount { expected, found, .. }) => {
                assert_eq!(expected, 1);
                assert_eq!(found, 2);
            }
            other => panic!("expected ArgCount, got {other:?}"),
        }
    }

    #[test]
    fn wrong_argument_type() {
        let mut factory = Factory::new(0);
        match factory.build("ru, (1, 2), 1") {
            Err(PmtrError::ArgType { position, found, .. }) => {
                assert_eq!(position, 1);
                assert_eq!(found, "list");
            }
            other => panic!("expected ArgType, got {other:?}"),
        }
    }

    #[test]
    fn unresolvable_argument_names_its_generator_and_slot() {
        let mut factory = Factory::new(0);
        let spec = ArgSpec::new("max", ArgKind::Num, "1");
        match factory.resolve("randomUniform", 2, &spec, &Literal::List(vec![]), 0) {
            Err(PmtrError::ArgType { tag, position, found, expected }) => {
                assert_eq!(tag, "randomUniform");
                assert_eq!(position, 2);
                assert_eq!(found, "list");
                assert_eq!(expected, ArgKind::Num.name());
            }
            other => panic!("expected ArgType, got {other:?}"),
        }
    }

    #[test]
    fn numbers_promote_to_constants() {
        let mut factory = Factory::new(0);
        let pmtr = factory.build("ru, 2, 5").unwrap();
        assert_eq!(
            pmtr.describe(DescribeMode::Full),
            "randomUniform, (constant, 2), (constant, 5)"
        );
        assert_eq!(pmtr.describe(DescribeMode::ArgsOnly), "(constant, 2), (constant, 5)");
    }

    #[test]
    fn nesting_beyond_ceiling_fails() {
        let config = GeneratorConfig {
            max_depth: 3,
            ..Default::default()
        };
        let mut factory = Factory::with_config(config, 0);
        assert!(factory.build("oa, (oa, (oa, 1, 1), 1), 1").is_ok());
        assert!(matches!(
            factory.build("oa, (oa, (oa, (oa, 1, 1), 1), 1), 1"),
            Err(PmtrError::TooDeep { depth: 3 })
        ));
    }

    #[test]
    fn build_checked_surfaces_validation_failures() {
        let mut factory = Factory::new(0);
        assert!(factory.build("q, 0, 0, 1, 1, (c, 0.3)").is_ok());
        assert!(factory.build_checked("q, 0, 0, 1, 1, (c, 0.3)").is_err());
    }
}
