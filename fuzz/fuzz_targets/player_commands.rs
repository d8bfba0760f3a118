#![no_main]

use airtune::api::NullApi;
use airtune::audio::NullSink;
use airtune::model::Track;
use airtune::player::Player;
use airtune::store::Store;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use std::time::Duration;

fn track(id: usize) -> Track {
    Track {
        id: format!("track_{id}"),
        name: format!("track {id}"),
        artist: String::from("fuzz"),
        album: String::from("fuzz"),
        source: String::from("qq"),
        pic: None,
        url: None,
        lrc: None,
        duration: None,
        types: Vec::new(),
    }
}

fuzz_target!(|data: &[u8]| {
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let mut player = Player::new(
        Box::new(NullSink::new()),
        Arc::new(NullApi),
        Store::at(dir.path().to_path_buf()),
        None,
    );

    let pool = (data.len() % 8).max(1);
    for byte in data {
        let pick = usize::from(*byte) % pool;
        match byte % 9 {
            0 => player.add_to_queue(track(pick)),
            1 => player.play_song(track(pick), None),
            2 => player.play_next(true),
            3 => player.play_next(false),
            4 => player.play_prev(),
            5 => player.toggle_play_mode(),
            6 => player.seek(Duration::from_secs(u64::from(*byte))),
            7 => player.remove_from_queue(&track(pick).key()),
            _ => player.pump(),
        }

        let mut seen = std::collections::HashSet::new();
        for entry in player.queue() {
            assert!(seen.insert(entry.key()), "duplicate queue entry");
        }
    }
});
