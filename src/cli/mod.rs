//! # CLI Module
//!
//! Command-line probe for route tables, shipped as the `brrtdispatch-probe` binary.
//!
//! Route files are YAML:
//!
//! ```yaml
//! routes:
//!   - method: GET
//!     pattern: /api/links/{id}
//!     name: Links.get
//!   - method: GET
//!     pattern: /files/{*rest}
//!     name: Files.download
//! fallback: Spa.index
//! ```
//!
//! ## Commands
//!
//! ### `routes`
//!
//! Print the table in match order:
//!
//! ```bash
//! brrtdispatch-probe --routes routes.yaml routes
//! ```
//!
//! ### `match`
//!
//! Resolve one request and print the destination and extracted route values:
//!
//! ```bash
//! brrtdispatch-probe --routes routes.yaml match --method GET --path /api/Links/42
//! ```

mod commands;


pub use commands::{load_route_file, run_cli, run_cli_to, Cli, Commands, RouteEntry, RouteFile};
