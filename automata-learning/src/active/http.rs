//! An [`Oracle`] that talks to a maze server over HTTP.
//!
//! The server exposes three endpoints, all of which are queried with `POST`:
//! - `/check_membership` takes the word as plain body and answers `1` or `0`,
//! - `/check_table` takes an [`EquivalenceRequest`] and answers `true` or a counterexample,
//! - `/generate_graph` takes [`MazeParameters`] and sets up a new target language.

use std::time::Duration;

use automata_core::prelude::*;
use itertools::Itertools;
use reqwest::{blocking::Client, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{Equivalence, ObservationTable, Oracle, OracleError};

/// Default base URL of the maze server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Stands in for the empty word in the prefix and suffix lists of an [`EquivalenceRequest`].
pub const EMPTY_WORD_TOKEN: &str = "e";

/// Where the server lives and how long a single request may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOracleConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpOracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// The body of an equivalence query. Word lists are separated by single spaces, `table` holds
/// all outputs row by row as `0`/`1` characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivalenceRequest {
    pub main_prefixes: String,
    pub complementary_prefixes: String,
    pub suffixes: String,
    pub table: String,
}

fn wire_token(word: &Word) -> String {
    if word.is_empty() {
        EMPTY_WORD_TOKEN.to_string()
    } else {
        word.as_string()
    }
}

impl From<&ObservationTable> for EquivalenceRequest {
    fn from(table: &ObservationTable) -> Self {
        Self {
            main_prefixes: table.main_prefixes().map(wire_token).join(" "),
            complementary_prefixes: table.pending_prefixes().map(wire_token).join(" "),
            suffixes: table.suffixes().iter().map(wire_token).join(" "),
            table: table
                .rows()
                .iter()
                .flat_map(|row| row.outputs().iter())
                .map(|output| if output { '1' } else { '0' })
                .collect(),
        }
    }
}

/// Parameters for generating a new maze on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeParameters {
    pub width: u32,
    pub height: u32,
    #[serde(rename = "pr_of_break_wall")]
    pub wall_probability: u32,
    #[serde(rename = "num_of_finish_edge")]
    pub exits: u32,
}

impl Default for MazeParameters {
    fn default() -> Self {
        Self {
            width: 2,
            height: 4,
            wall_probability: 3,
            exits: 1,
        }
    }
}

/// Reads the answer to a membership query.
pub fn parse_membership(body: &str) -> Result<bool, OracleError> {
    match body.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(OracleError::MalformedResponse(format!(
            "expected membership answer 0 or 1, got {other:?}"
        ))),
    }
}

/// Reads the answer to an equivalence query. Whether a counterexample actually is a word over
/// the alphabet is left to the learner.
pub fn parse_equivalence(body: &str) -> Equivalence {
    match body.trim() {
        "true" => Equivalence::Equivalent,
        counterexample => Equivalence::Counterexample(Word::from(counterexample)),
    }
}

/// A blocking client for the maze server. It owns a single connection pool that lives as long
/// as the oracle does.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: Client,
    config: HttpOracleConfig,
}

impl HttpOracle {
    pub fn new(config: HttpOracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(format!("could not build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpOracleConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Sends the request and returns the body of a successful response.
    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<String, OracleError> {
        let response = request
            .send()
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Unavailable(format!(
                "server answered with status {status}"
            )));
        }
        response
            .text()
            .map_err(|e| OracleError::Unavailable(format!("could not read response body: {e}")))
    }

    /// Asks the server to generate a new maze, which becomes the target language of all
    /// subsequent queries.
    pub fn generate_maze(&self, parameters: &MazeParameters) -> Result<(), OracleError> {
        debug!("requesting maze generation with {parameters:?}");
        self.send(
            self.client
                .post(self.endpoint("generate_graph"))
                .json(parameters),
        )?;
        Ok(())
    }
}

impl Oracle for HttpOracle {
    fn membership(&self, word: &Word) -> Result<bool, OracleError> {
        let body = self.send(
            self.client
                .post(self.endpoint("check_membership"))
                .header(CONTENT_TYPE, "application/json")
                .body(word.as_string()),
        )?;
        let output = parse_membership(&body)?;
        trace!("membership of {} is {}", word.show(), output.show());
        Ok(output)
    }

    fn equivalence(&self, table: &ObservationTable) -> Result<Equivalence, OracleError> {
        let request = EquivalenceRequest::from(table);
        debug!(
            "posing equivalence query with {} classified and {} pending rows",
            table.main_end(),
            table.len() - table.main_end()
        );
        let body = self.send(self.client.post(self.endpoint("check_table")).json(&request))?;
        Ok(parse_equivalence(&body))
    }
}
