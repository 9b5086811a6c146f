use serenity::{
    all::Colour,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::sources::Track;

/// Cantidad de tracks que muestra la vista de cola
pub const QUEUE_VIEW_LIMIT: usize = 10;

/// Paleta de colores del bot
pub mod colors {
    use serenity::all::Colour;

    pub const SEARCH_BLUE: Colour = Colour::new(0x3498db);
    pub const QUEUE_GREEN: Colour = Colour::from_rgb(46, 204, 113);
}

/// Embed de la canción que está sonando
pub fn now_playing(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎶 Now playing")
        .description(format!("[{}]({})", track.title(), track.url()))
        .color(Colour::BLURPLE)
        .field("Author", track.author(), true)
        .field("Duration", track.duration_label(), true);

    if let Some(requester) = track.requester() {
        let mut footer = CreateEmbedFooter::new(format!("Requested: {}", requester.display_name));
        if let Some(avatar) = &requester.avatar_url {
            footer = footer.icon_url(avatar);
        }
        embed = embed.footer(footer);
    }

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

/// Embed del mensaje con el menú de selección
pub fn search_prompt() -> CreateEmbed {
    CreateEmbed::default()
        .title("🔍 Found:")
        .description("Select a track:")
        .color(colors::SEARCH_BLUE)
}

/// Vista de los próximos tracks de la cola
pub fn queue_view(tracks: &[Track]) -> CreateEmbed {
    tracks.iter().take(QUEUE_VIEW_LIMIT).enumerate().fold(
        CreateEmbed::default()
            .title("📄 Track queue")
            .color(colors::QUEUE_GREEN),
        |embed, (i, track)| {
            embed.field(
                format!("{}. {}", i + 1, track.title()),
                format!("Duration: `{}`", track.duration_label()),
                false,
            )
        },
    )
}
