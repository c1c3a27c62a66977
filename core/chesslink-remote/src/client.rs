//! HTTP client for the remote chess server.
//!
//! Every request goes through [`RemoteClient::network_call`], which applies
//! the local rate limit, attaches the stored bearer token, and classifies the
//! response into [`RemoteError`] kinds.

use crate::error::{RemoteError, RemoteResult};
use crate::rate_limit::RateLimiter;
use crate::service::{ChessService, GameStateStream};
use crate::session::{Credentials, SessionStore};
use crate::stream::{GameStreamDecoder, NdjsonLines, parse_game_start};
use async_trait::async_trait;
use chesslink_types::{BroadcastRound, BroadcastTournament, RemoteGame, RemoteGameState};
use futures::StreamExt;
use futures::stream;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Remote client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the server (e.g. `https://lichess.org`).
    pub api_base_url: String,
    pub user_agent: String,
    /// How long to stop calling after a 429 response.
    pub cooldown: Duration,
    /// Sliding window for the local request budget.
    pub request_window: Duration,
    /// Calls allowed per window. Zero disables the budget.
    pub max_requests_per_window: u32,
    /// How long `await_game_start` listens before giving up.
    pub game_start_wait: Duration,
    /// TCP connect timeout for every request.
    pub connect_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://lichess.org".to_string(),
            user_agent: format!("chesslink/{}", env!("CARGO_PKG_VERSION")),
            cooldown: Duration::from_secs(60),
            request_window: Duration::from_secs(60),
            max_requests_per_window: 120,
            game_start_wait: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
}

#[derive(Deserialize)]
struct TourResponse {
    tour: BroadcastTournament,
}

#[derive(Deserialize)]
struct RoundResponse {
    round: BroadcastRound,
}

/// Remote chess server client.
pub struct RemoteClient {
    config: RemoteConfig,
    http: Client,
    limiter: RateLimiter,
    session: Arc<SessionStore>,
    network_available: Arc<watch::Sender<bool>>,
}

impl RemoteClient {
    /// Creates a client that reads and clears credentials in `session`.
    pub fn new(config: RemoteConfig, session: Arc<SessionStore>) -> RemoteResult<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RemoteError::Config(format!("failed to create HTTP client: {e}")))?;
        let limiter = RateLimiter::new(config.request_window, config.max_requests_per_window);
        let (network_available, _) = watch::channel(true);

        Ok(Self {
            config,
            http,
            limiter,
            session,
            network_available: Arc::new(network_available),
        })
    }

    /// False after a transport failure, true again after the next success.
    pub fn network_available(&self) -> watch::Receiver<bool> {
        self.network_available.subscribe()
    }

    /// Time left on a server-imposed cool-down.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        self.limiter.cooldown_remaining()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    fn credentials(&self) -> RemoteResult<Credentials> {
        self.session.credentials()?.ok_or(RemoteError::NotSignedIn)
    }

    /// Sends an authenticated request built by `build`.
    async fn network_call<F>(&self, build: F) -> RemoteResult<Response>
    where
        F: FnOnce(&Client) -> RequestBuilder,
    {
        let credentials = self.credentials()?;
        self.dispatch(build(&self.http).bearer_auth(&credentials.token))
            .await
    }

    async fn dispatch(&self, request: RequestBuilder) -> RemoteResult<Response> {
        if let Err(retry_after) = self.limiter.try_acquire() {
            return Err(RemoteError::TooManyRequests { retry_after });
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                set_network_available(&self.network_available, false);
                return Err(RemoteError::Io(e.to_string()));
            }
        };
        set_network_available(&self.network_available, true);

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => {
                warn!("server rejected credentials, signing out");
                self.session.clear_credentials()?;
                Err(RemoteError::NotSignedIn)
            }
            StatusCode::FORBIDDEN => {
                warn!("server denied access, signing out");
                self.session.clear_credentials()?;
                Err(RemoteError::Authorization(body))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "rate limited by server"
                );
                self.limiter.cool_down(self.config.cooldown);
                Err(RemoteError::TooManyRequests {
                    retry_after: self.config.cooldown,
                })
            }
            other => Err(RemoteError::GenericNetwork {
                status: other.as_u16(),
                body,
            }),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> RemoteResult<T> {
        let text = response.text().await.map_err(|e| {
            set_network_available(&self.network_available, false);
            RemoteError::Io(e.to_string())
        })?;
        serde_json::from_str(&text).map_err(|e| RemoteError::InvalidMessage(e.to_string()))
    }

    /// Looks up the account that owns `token`.
    pub async fn fetch_account(&self, token: &str) -> RemoteResult<Account> {
        let request = self.http.get(self.url("/api/account")).bearer_auth(token);
        let response = self.dispatch(request).await?;
        self.read_json(response).await
    }

    async fn read_game_start(&self, response: &mut Response) -> RemoteResult<Option<RemoteGame>> {
        let mut lines = NdjsonLines::new();
        loop {
            while let Some(line) = lines.next_line()? {
                if let Some(game) = parse_game_start(&line, &self.config.api_base_url)? {
                    return Ok(Some(game));
                }
            }
            match response.chunk().await {
                Ok(Some(chunk)) => lines.push(&chunk),
                Ok(None) => return Ok(None),
                Err(e) => {
                    set_network_available(&self.network_available, false);
                    return Err(RemoteError::Io(e.to_string()));
                }
            }
        }
    }
}

fn set_network_available(sender: &watch::Sender<bool>, up: bool) {
    sender.send_if_modified(|current| {
        if *current == up {
            return false;
        }
        *current = up;
        if up {
            info!("remote server reachable again");
        } else {
            warn!("remote server unreachable");
        }
        true
    });
}

#[async_trait]
impl ChessService for RemoteClient {
    async fn sign_in(&self, token: &str) -> RemoteResult<String> {
        let account = self.fetch_account(token).await?;
        self.session.save_credentials(&Credentials {
            token: token.to_string(),
            username: account.username.clone(),
        })?;
        info!(username = %account.username, "signed in");
        Ok(account.username)
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        self.session.clear_credentials()?;
        info!("signed out");
        Ok(())
    }

    async fn create_tournament(&self, name: &str) -> RemoteResult<BroadcastTournament> {
        let url = self.url("/broadcast/new");
        let response = self
            .network_call(|http| {
                http.post(url).form(&[
                    ("name", name),
                    ("description", "Live games from a chesslink board"),
                ])
            })
            .await?;
        let tour: TourResponse = self.read_json(response).await?;
        info!(id = %tour.tour.id, "created broadcast tournament");
        Ok(tour.tour)
    }

    async fn create_round(
        &self,
        tournament: &BroadcastTournament,
        name: &str,
    ) -> RemoteResult<BroadcastRound> {
        let url = self.url(&format!(
            "/broadcast/{}/new",
            urlencoding::encode(&tournament.id)
        ));
        let response = self
            .network_call(|http| http.post(url).form(&[("name", name)]))
            .await?;
        let round: RoundResponse = self.read_json(response).await?;
        info!(id = %round.round.id, tournament = %tournament.id, "created broadcast round");
        Ok(round.round)
    }

    async fn push_pgn(&self, round: &BroadcastRound, pgn: &str) -> RemoteResult<()> {
        let url = self.url(&format!(
            "/api/broadcast/round/{}/push",
            urlencoding::encode(&round.id)
        ));
        let body = pgn.to_string();
        self.network_call(|http| {
            http.post(url)
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(body)
        })
        .await?;
        debug!(round = %round.id, bytes = pgn.len(), "pushed PGN");
        Ok(())
    }

    async fn push_move(&self, game: &RemoteGame, uci: &str) -> RemoteResult<()> {
        let url = self.url(&format!(
            "/api/board/game/{}/move/{}",
            urlencoding::encode(&game.id),
            urlencoding::encode(uci)
        ));
        self.network_call(|http| http.post(url)).await?;
        debug!(game = %game.id, uci, "pushed move");
        Ok(())
    }

    async fn await_game_start(&self) -> RemoteResult<Option<RemoteGame>> {
        let url = self.url("/api/stream/event");
        let wait = self.config.game_start_wait;
        let search = async {
            let mut response = self.network_call(|http| http.get(url)).await?;
            self.read_game_start(&mut response).await
        };
        match tokio::time::timeout(wait, search).await {
            Ok(result) => result,
            Err(_) => {
                debug!(wait_ms = wait.as_millis() as u64, "no game started");
                Ok(None)
            }
        }
    }

    async fn game_state_stream(&self, game: &RemoteGame) -> RemoteResult<GameStateStream> {
        let credentials = self.credentials()?;
        let url = self.url(&format!(
            "/api/board/game/stream/{}",
            urlencoding::encode(&game.id)
        ));
        let response = self.network_call(|http| http.get(url)).await?;
        info!(game = %game.id, "streaming game state");

        let reader = GameStreamReader {
            response: Some(response),
            lines: NdjsonLines::new(),
            decoder: GameStreamDecoder::new(credentials.username),
            network_available: Arc::clone(&self.network_available),
            closed: false,
        };
        Ok(stream::unfold(reader, |mut reader| async move {
            let item = reader.next_state().await?;
            Some((item, reader))
        })
        .boxed())
    }

    async fn import_game(&self, pgn: &str) -> RemoteResult<RemoteGame> {
        let url = self.url("/api/import");
        let response = self
            .network_call(|http| http.post(url).form(&[("pgn", pgn)]))
            .await?;
        let game: RemoteGame = self.read_json(response).await?;
        info!(id = %game.id, "imported game");
        Ok(game)
    }
}

/// Owns the response body of a game stream. Dropping it closes the stream.
struct GameStreamReader {
    response: Option<Response>,
    lines: NdjsonLines,
    decoder: GameStreamDecoder,
    network_available: Arc<watch::Sender<bool>>,
    closed: bool,
}

impl GameStreamReader {
    fn close(&mut self) {
        self.closed = true;
        self.response = None;
    }

    async fn next_state(&mut self) -> Option<RemoteResult<RemoteGameState>> {
        loop {
            if self.closed {
                return None;
            }
            match self.lines.next_line() {
                Ok(Some(line)) => match self.decoder.decode_line(&line) {
                    Ok(Some(state)) => {
                        if self.decoder.is_finished() {
                            debug!(game = %state.game_id, "game over, closing stream");
                            self.close();
                        }
                        return Some(Ok(state));
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        self.close();
                        return Some(Err(e));
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    self.close();
                    return Some(Err(e));
                }
            }

            let Some(response) = self.response.as_mut() else {
                return None;
            };
            match response.chunk().await {
                Ok(Some(chunk)) => self.lines.push(&chunk),
                Ok(None) => {
                    // Flush an unterminated last line, then end.
                    self.lines.push(b"\n");
                    self.response = None;
                }
                Err(e) => {
                    set_network_available(&self.network_available, false);
                    self.close();
                    return Some(Err(RemoteError::Io(e.to_string())));
                }
            }
        }
    }
}
