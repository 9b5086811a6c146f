use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton, CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption},
};

/// Máximo de caracteres que acepta Discord en la etiqueta de una opción
pub const MAX_LABEL_CHARS: usize = 100;

/// IDs personalizados de los componentes
pub mod button_ids {
    pub const PAUSE_RESUME: &str = "jukebox_pause_resume";
    pub const REPEAT: &str = "jukebox_repeat";
    pub const SKIP: &str = "jukebox_skip";
    pub const QUEUE: &str = "jukebox_queue";
    pub const TRACK_SELECT: &str = "jukebox_track_select";
}

/// Opción del menú de selección: etiqueta visible y valor devuelto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub label: String,
    pub value: String,
}

/// Controles adjuntos al mensaje "now playing"
pub fn player_controls() -> Vec<CreateActionRow> {
    let pause_btn = CreateButton::new(button_ids::PAUSE_RESUME)
        .label("⏯ Pause/Continue")
        .style(ButtonStyle::Primary);

    let repeat_btn = CreateButton::new(button_ids::REPEAT)
        .label("🔁 Repeat")
        .style(ButtonStyle::Secondary);

    let skip_btn = CreateButton::new(button_ids::SKIP)
        .label("⏭ Skip")
        .style(ButtonStyle::Danger);

    let queue_btn = CreateButton::new(button_ids::QUEUE)
        .label("📄 Queue")
        .style(ButtonStyle::Success);

    vec![CreateActionRow::Buttons(vec![
        pause_btn, repeat_btn, skip_btn, queue_btn,
    ])]
}

/// Menú de selección de un único track
pub fn track_select_menu(options: &[MenuOption]) -> CreateActionRow {
    let options = options
        .iter()
        .map(|option| CreateSelectMenuOption::new(&option.label, &option.value))
        .collect();

    let menu = CreateSelectMenu::new(button_ids::TRACK_SELECT, CreateSelectMenuKind::String { options })
        .placeholder("Select a track")
        .min_values(1)
        .max_values(1);

    CreateActionRow::SelectMenu(menu)
}

/// Recorta una etiqueta a [`MAX_LABEL_CHARS`] caracteres (no bytes)
pub fn truncate_label(label: &str) -> String {
    label.chars().take(MAX_LABEL_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truncate_label_counts_characters() {
        assert_eq!(truncate_label("short"), "short");

        let long = "é".repeat(150);
        let truncated = truncate_label(&long);
        assert_eq!(truncated.chars().count(), MAX_LABEL_CHARS);
        assert_eq!(truncated.len(), MAX_LABEL_CHARS * 2);
    }

    #[test]
    fn test_controls_are_a_single_row() {
        let rows = serde_json::to_value(player_controls()).unwrap();
        let buttons = rows[0]["components"].as_array().unwrap();

        let labels: Vec<&str> = buttons.iter().map(|b| b["label"].as_str().unwrap()).collect();
        assert_eq!(
            labels,
            vec!["⏯ Pause/Continue", "🔁 Repeat", "⏭ Skip", "📄 Queue"]
        );
        assert_eq!(buttons[2]["custom_id"], button_ids::SKIP);
    }
}
