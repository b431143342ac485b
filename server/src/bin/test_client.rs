//! Scripted player for manual testing: joins a room, readies a fixed fleet
//! and fires random standard shots whenever it holds the turn.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use server::combatant::FLEET;
use shared::codec;
use shared::{
    Heading, Mode, OrdinanceKind, Packet, VesselPlacement, ViewerState, BOARD_SIZE,
};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the server
    #[arg(short, long, default_value = "ws://127.0.0.1:2000")]
    url: String,

    /// Room to join
    #[arg(short, long, default_value = "walnut")]
    room: String,

    /// Use bincode binary frames instead of JSON text
    #[arg(short, long)]
    binary: bool,

    /// Delay before each shot in milliseconds
    #[arg(short, long, default_value = "500")]
    delay: u64,
}

fn encode(packet: &Packet, binary: bool) -> Result<Message, codec::CodecError> {
    if binary {
        codec::encode_binary(packet).map(Message::Binary)
    } else {
        codec::encode_text(packet).map(Message::Text)
    }
}

/// Five vessels facing east in alternating rows from the left edge.
fn starting_fleet() -> Vec<VesselPlacement> {
    FLEET
        .iter()
        .enumerate()
        .map(|(i, (name, _, _))| VesselPlacement {
            name: name.to_string(),
            x: 1,
            y: 2 + 2 * i as i32,
            heading: Heading::East,
        })
        .collect()
}

/// Picks a random cell this player has not fired at yet.
fn pick_target(state: &ViewerState, rng: &mut impl Rng) -> Option<(i32, i32)> {
    let fired: HashSet<(i32, i32)> = state
        .player_state
        .shots
        .iter()
        .map(|shot| (shot.x, shot.y))
        .collect();
    let open: Vec<(i32, i32)> = (1..=BOARD_SIZE)
        .flat_map(|x| (1..=BOARD_SIZE).map(move |y| (x, y)))
        .filter(|cell| !fired.contains(cell))
        .collect();

    if open.is_empty() {
        None
    } else {
        Some(open[rng.gen_range(0..open.len())])
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.url);
    let (ws_stream, _) = connect_async(args.url.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    let mut rng = rand::thread_rng();
    let mut client_id = None;
    let mut readied = false;
    let mut last_fired_turn = 0;

    while let Some(frame) = read.next().await {
        let packet = match frame? {
            Message::Text(text) => codec::decode_text(&text)?,
            Message::Binary(data) => codec::decode_binary(&data)?,
            Message::Close(_) => break,
            _ => continue,
        };

        match packet {
            Packet::Connected { client_id: id } => {
                println!("Connected with client ID: {}", id);
                client_id = Some(id);
                let join = Packet::Join {
                    room: args.room.clone(),
                };
                write.send(encode(&join, args.binary)?).await?;
            }
            Packet::Chat { text } => println!("[chat] {}", text),
            Packet::Disconnected { reason } => {
                println!("Disconnected by server: {}", reason);
                break;
            }
            Packet::StateUpdate(state) => {
                let Some(id) = client_id else {
                    continue;
                };
                println!(
                    "Turn {} ({:?}): {} shots fired, my turn: {}",
                    state.turn_number,
                    state.mode,
                    state.player_state.shots.len(),
                    state.player_state.is_turn
                );

                match state.mode {
                    Mode::Placement if !readied && state.player_state.slot_number.is_some() => {
                        let ready = Packet::Ready {
                            vessels: starting_fleet(),
                            ready: true,
                        };
                        write.send(encode(&ready, args.binary)?).await?;
                        readied = true;
                    }
                    Mode::Play
                        if state.player_state.is_turn && state.turn_number != last_fired_turn =>
                    {
                        let Some((x, y)) = pick_target(&state, &mut rng) else {
                            continue;
                        };
                        sleep(Duration::from_millis(args.delay)).await;
                        println!("Firing at {},{}", x, y);
                        let attack = Packet::Attack {
                            attacker_id: id,
                            x,
                            y,
                            ordinance: OrdinanceKind::Standard,
                        };
                        write.send(encode(&attack, args.binary)?).await?;
                        last_fired_turn = state.turn_number;
                    }
                    Mode::GameOver => {
                        let outcome = if state.player_state.is_winner {
                            "won"
                        } else {
                            "lost"
                        };
                        println!("Game over on turn {}: we {}", state.turn_number, outcome);
                        write.send(encode(&Packet::Disconnect, args.binary)?).await?;
                        break;
                    }
                    _ => {}
                }
            }
            other => println!("Unexpected packet: {:?}", other),
        }
    }

    println!("Test client finished");
    Ok(())
}
