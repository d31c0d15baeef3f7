// Parameter generators
//
// A library of small, composable, stateful value generators. A generator is
// built from a textual argument list such as `(ru, 0, (bg, oc, (1, 2)))`,
// produces one value per time step, can be reset to replay its output, and
// renders itself back into canonical text that rebuilds an equivalent
// generator. Generators nest: most numeric arguments are themselves
// generators sampled at the same step.
//
// Architecture:
// - literal.rs: Argument-literal grammar (numbers, strings, nested lists)
// - args.rs: Argument kinds, signatures, and the typed slot vector a
//   constructor reads from
// - factory.rs: Name registry, argument normalization, recursive construction
// - generator.rs: The `Generator` trait and the `Pmtr` wrapper
// - generators/: Every registered generator type, grouped by family
// - selector.rs: Selection policies over a finite sequence
// - stream.rs: Resettable random stream
// - unit.rs: Unit-interval helpers (limit, normalize, boundary fitting)
// - markov.rs: Markov transition tables with n-order backoff
// - sieve.rs: Xenakis residual-class sieves
// - automata.rs: One-dimensional cellular automata and table extraction
// - quantize.rs: Grid quantization with partial attraction
// - chaos.rs: Logistic, Hénon, and Lorenz maps; Fibonacci and prime series
// - value.rs: Produced values and the context map
// - config.rs: Loop ceilings and limits
// - error.rs: Construction errors and validation failures
//
// Everything is deterministic given the factory seed.

pub mod args;
pub mod automata;
pub mod chaos;
pub mod config;
pub mod error;
pub mod factory;
pub mod generator;
pub mod generators;
pub mod literal;
pub mod markov;
pub mod quantize;
pub mod selector;
pub mod sieve;
pub mod stream;
pub mod unit;
pub mod value;

pub use config::GeneratorConfig;
pub use error::{PmtrError, SyntaxKind, ValidationFailure};
pub use factory::Factory;
pub use generator::{DescribeMode, Generator, Pmtr};
pub use value::{Context, Value};
