//! JSON-lines TCP bridge for external renderers and controllers.
//!
//! Connection threads only decode and forward; every request is answered
//! by the single loop that owns the [`Game`].

mod controller;
mod protocol;
mod server;

pub use controller::{BridgeEndpoint, BridgeMsg};
pub use server::BridgeServer;

use anyhow::Result;
use serde_json::Value;
use tesselbox_world::PersistError;
use tracing::{info, warn};

use crate::game::{Game, GameState, DEFAULT_WORLD_NAME, HOTBAR_SLOTS};
use protocol::{ErrorCode, Request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Answer requests until a controller asks for shutdown or every sender
/// is gone.
pub fn serve(game: &mut Game, endpoint: &BridgeEndpoint) -> Result<()> {
    loop {
        let Ok(msg) = endpoint.rx.recv() else {
            warn!("Bridge channel closed");
            return Ok(());
        };
        match msg {
            BridgeMsg::Connected => info!("Bridge controller attached"),
            BridgeMsg::Disconnected => info!("Bridge controller detached"),
            BridgeMsg::Request {
                request,
                respond_to,
            } => {
                let (value, flow) = handle_request(game, request);
                let _ = respond_to.send(value);
                if flow == Flow::Shutdown {
                    info!("Bridge shutdown requested");
                    return Ok(());
                }
            }
        }
    }
}

pub fn handle_request(game: &mut Game, request: Request) -> (Value, Flow) {
    let id = request.request_id();
    let playing = game.state() == GameState::Playing;
    let not_playing = |id| protocol::event_error(id, ErrorCode::NotPlaying, "no game is running");

    let value = match request {
        Request::Start(start) => {
            let name = start
                .world
                .unwrap_or_else(|| DEFAULT_WORLD_NAME.to_string());
            match game.start(start.mode, &name, start.seed) {
                Ok(()) => {
                    let seed = game.session().map_or(0, |session| session.world.seed());
                    protocol::event_started(id, &name, seed, start.mode)
                }
                Err(err) => {
                    let code = match err.downcast_ref::<PersistError>() {
                        Some(PersistError::InvalidName(_)) => ErrorCode::BadRequest,
                        _ => ErrorCode::Internal,
                    };
                    protocol::event_error(id, code, format!("{err:#}"))
                }
            }
        }
        Request::Update(update) => {
            if game.state() == GameState::Menu {
                not_playing(id)
            } else {
                let outcomes = game.tick(&update.keys, update.intent);
                let views: Vec<_> = outcomes.iter().map(|o| o.view(game.catalog())).collect();
                protocol::event_updated(id, game.tick_count().0, &views)
            }
        }
        Request::GetState { .. } => {
            let view = game.view();
            protocol::event_state(id.clone(), game.state(), view.as_ref()).unwrap_or_else(|err| {
                protocol::event_error(id, ErrorCode::Internal, err.to_string())
            })
        }
        Request::Mine(target) if playing => {
            let outcome = game.mine_at(target.at);
            protocol::event_action(id, &outcome.view(game.catalog()))
        }
        Request::Place(target) if playing => {
            let outcome = game.place_at(target.at);
            protocol::event_action(id, &outcome.view(game.catalog()))
        }
        Request::SelectSlot(select) if playing => {
            if select.slot >= HOTBAR_SLOTS {
                protocol::event_error(
                    id,
                    ErrorCode::BadRequest,
                    format!("slot must be below {HOTBAR_SLOTS}"),
                )
            } else {
                if let Some(session) = game.session_mut() {
                    session.player.selected_slot = select.slot;
                }
                protocol::event_ok(id)
            }
        }
        Request::Jump { .. } if playing => {
            if let Some(session) = game.session_mut() {
                session.player.jump();
            }
            protocol::event_ok(id)
        }
        Request::Mine(_) | Request::Place(_) | Request::SelectSlot(_) | Request::Jump { .. } => {
            not_playing(id)
        }
        Request::Save { .. } => {
            if game.session().is_none() {
                not_playing(id)
            } else {
                match game.save() {
                    Ok(()) => protocol::event_ok(id),
                    Err(err) => protocol::event_error(id, ErrorCode::Internal, format!("{err:#}")),
                }
            }
        }
        Request::ListWorlds { .. } => match game.list_worlds() {
            Ok(worlds) => protocol::event_worlds(id, &worlds, &game.next_world_name()),
            Err(err) => protocol::event_error(id, ErrorCode::Internal, format!("{err:#}")),
        },
        Request::Menu { .. } => match game.back_to_menu() {
            Ok(()) => protocol::event_ok(id),
            Err(err) => protocol::event_error(id, ErrorCode::Internal, format!("{err:#}")),
        },
        Request::Shutdown { .. } => return (protocol::event_ok(id), Flow::Shutdown),
        Request::Hello(_) | Request::Unknown { .. } => protocol::event_error(
            id,
            ErrorCode::Unsupported,
            "handled by the connection",
        ),
    };
    (value, Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use protocol::decode_request;
    use std::fs;
    use std::sync::Arc;
    use tesselbox_core::Catalog;
    use tesselbox_testkit::unique_temp_dir;

    fn game(tag: &str) -> (Game, std::path::PathBuf) {
        let dir = unique_temp_dir(tag);
        let config = GameConfig {
            saves_dir: dir.clone(),
            ..GameConfig::default()
        };
        (Game::new(config, Arc::new(Catalog::builtin())).unwrap(), dir)
    }

    fn call(game: &mut Game, line: &str) -> Value {
        let request = decode_request(line).expect("valid request");
        let (value, flow) = handle_request(game, request);
        assert_eq!(flow, Flow::Continue);
        value
    }

    #[test]
    fn gameplay_requests_need_a_running_game() {
        let (mut game, dir) = game("bridge_menu");
        for line in [
            r#"{"op":"update","id":1}"#,
            r#"{"op":"mine","id":2,"at":[0,0]}"#,
            r#"{"op":"jump","id":3}"#,
            r#"{"op":"save","id":4}"#,
        ] {
            assert_eq!(call(&mut game, line)["code"], "not_playing", "{line}");
        }
        let state = call(&mut game, r#"{"op":"state","id":5}"#);
        assert_eq!(state["in_game"], false);
        assert_eq!(state["state"], "menu");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn start_update_state_round() {
        let (mut game, dir) = game("bridge_round");
        let started = call(
            &mut game,
            r#"{"op":"start","id":1,"mode":"creative","world":"bridged","seed":42}"#,
        );
        assert_eq!(started["event"], "started");
        assert_eq!(started["seed"], 42);
        assert_eq!(started["mode"], "creative");

        let updated = call(&mut game, r#"{"op":"update","id":2,"keys":{"d":true}}"#);
        assert_eq!(updated["event"], "updated");
        assert_eq!(updated["tick"], 1);

        assert_eq!(call(&mut game, r#"{"op":"select_slot","id":3,"slot":4}"#)["event"], "ok");
        assert_eq!(
            call(&mut game, r#"{"op":"select_slot","id":4,"slot":9}"#)["code"],
            "bad_request"
        );

        let state = call(&mut game, r#"{"op":"state","id":5}"#);
        assert_eq!(state["in_game"], true);
        assert_eq!(state["frame"]["player"]["selected_slot"], 4);
        assert_eq!(state["frame"]["world"], "bridged");
        assert!(state["frame"]["hexagons"].as_array().is_some_and(|h| !h.is_empty()));

        assert_eq!(call(&mut game, r#"{"op":"menu","id":6}"#)["event"], "ok");
        let worlds = call(&mut game, r#"{"op":"list_worlds","id":7}"#);
        assert_eq!(worlds["worlds"], serde_json::json!(["bridged"]));
        assert_eq!(worlds["next"], "world");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn mining_reports_an_action() {
        let (mut game, dir) = game("bridge_action");
        call(&mut game, r#"{"op":"start","id":1,"world":"dig","seed":3}"#);
        let action = call(&mut game, r#"{"op":"mine","id":2,"at":[640,-5000]}"#);
        assert_eq!(action["event"], "action");
        assert_eq!(action["outcome"]["outcome"], "missed");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn invalid_world_name_is_a_bad_request() {
        let (mut game, dir) = game("bridge_badname");
        let reply = call(&mut game, r#"{"op":"start","id":1,"world":"a/b"}"#);
        assert_eq!(reply["code"], "bad_request");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let (mut game, dir) = game("bridge_shutdown");
        let request = decode_request(r#"{"op":"shutdown","id":9}"#).unwrap();
        let (value, flow) = handle_request(&mut game, request);
        assert_eq!(value["event"], "ok");
        assert_eq!(flow, Flow::Shutdown);
        fs::remove_dir_all(&dir).ok();
    }
}
