use crate::transcoder::SpriteTile;

/// Renders the sprite-sheet cue file for one scene: one cue per tile, the
/// `HH:MM:SS.mmm --> HH:MM:SS.mmm` time range on its own line, the sheet URL
/// with an `#xywh=x,y,w,h` fragment on the next, separated by a blank line.
/// Must be byte-exact with the W3C WebVTT profile the player consumes, so
/// this never goes through a templating crate — just formatted writes.
pub fn render_sprite_cues(sheet_url: &str, tiles: &[SpriteTile]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for tile in tiles {
        out.push_str(&format_timestamp(tile.start_secs));
        out.push_str(" --> ");
        out.push_str(&format_timestamp(tile.end_secs));
        out.push('\n');
        out.push_str(sheet_url);
        out.push_str(&format!(
            "#xywh={},{},{},{}\n\n",
            tile.x, tile.y, tile.width, tile.height
        ));
    }
    out
}

fn format_timestamp(total_secs: f64) -> String {
    let total_millis = (total_secs * 1000.0).round().max(0.0) as u64;
    let millis = total_millis % 1000;
    let total_secs_whole = total_millis / 1000;
    let secs = total_secs_whole % 60;
    let total_mins = total_secs_whole / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;
    format!("{hours:02}:{mins:02}:{secs:02}.{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_timestamp_with_millisecond_precision() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(5.25), "00:00:05.250");
        assert_eq!(format_timestamp(3661.5), "01:01:01.500");
    }

    #[test]
    fn renders_one_cue_block_per_tile() {
        let tiles = vec![
            SpriteTile { start_secs: 0.0, end_secs: 10.0, x: 0, y: 0, width: 160, height: 90 },
            SpriteTile { start_secs: 10.0, end_secs: 20.0, x: 160, y: 0, width: 160, height: 90 },
        ];
        let cue = render_sprite_cues("sprites/42.jpg", &tiles);
        assert_eq!(
            cue,
            "WEBVTT\n\n\
             00:00:00.000 --> 00:00:10.000\n\
             sprites/42.jpg#xywh=0,0,160,90\n\n\
             00:00:10.000 --> 00:00:20.000\n\
             sprites/42.jpg#xywh=160,0,160,90\n\n"
        );
    }
}
