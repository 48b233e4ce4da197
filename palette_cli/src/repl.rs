use palette_core::{
    Accounts, Config, JsonFileStore, Outcome, PaletteEditor, PaletteId, PaletteView, Session,
    Studio,
};
use std::io::{self, Write};

use crate::{block_on_rating, print_palette};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    Show,
    Feed,
    Name(String),
    Hex(usize, String),
    Pick(usize),
    Close,
    Press(f64, f64),
    Drag(f64, f64),
    Release,
    Hue(f64),
    Save,
    Load(PaletteId),
    Delete(PaletteId),
    Cancel,
    Rate,
    Login(String, String),
    Signup(String, String),
    Logout,
}

const HELP: &str = r#"Commands:
    show                 draft colors, flags and name
    feed                 saved palettes (* = yours)
    name <text...>       set the palette name
    hex <slot> <text>    type into a slot's hex box (slots 1..5)
    pick <slot>          open / close the picker on a slot
    close                close the picker
    press <x> <y>        pointer down on the picker (field 0..W, hue strip below)
    drag <x> <y>         pointer move while pressed
    release              pointer up
    hue <0..1>           set the picker hue directly
    save                 submit the draft
    load <id>            edit one of your palettes
    delete <id>          delete one of your palettes
    cancel               discard the draft
    rate                 rate the draft's colors
    login <email> <pw>
    signup <email> <pw>
    logout
    quit
"#;

fn slot(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(n @ 1..=5) => Ok(n - 1),
        _ => Err(format!("slot must be 1..5, got '{raw}'")),
    }
}

fn number(raw: &str) -> Result<f64, String> {
    raw.parse().map_err(|_| format!("'{raw}' is not a number"))
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return Err("empty line".into());
    };

    let cmd = first.to_lowercase();
    let usage = |u: &str| -> Result<Command, String> { Err(format!("Usage: {u}")) };

    match (cmd.as_str(), &parts[1..]) {
        ("help", _) => Ok(Command::Help),
        ("quit" | "exit", _) => Ok(Command::Quit),
        ("show", _) => Ok(Command::Show),
        ("feed" | "list", _) => Ok(Command::Feed),
        ("name", rest) => Ok(Command::Name(rest.join(" "))),
        ("hex", [s, text]) => Ok(Command::Hex(slot(s)?, text.to_string())),
        ("hex", _) => usage("hex <slot> <text>"),
        ("pick", [s]) => Ok(Command::Pick(slot(s)?)),
        ("pick", _) => usage("pick <slot>"),
        ("close", _) => Ok(Command::Close),
        ("press", [x, y]) => Ok(Command::Press(number(x)?, number(y)?)),
        ("press", _) => usage("press <x> <y>"),
        ("drag", [x, y]) => Ok(Command::Drag(number(x)?, number(y)?)),
        ("drag", _) => usage("drag <x> <y>"),
        ("release", _) => Ok(Command::Release),
        ("hue", [h]) => Ok(Command::Hue(number(h)?)),
        ("hue", _) => usage("hue <0..1>"),
        ("save", _) => Ok(Command::Save),
        ("load" | "edit", [id]) => id
            .parse()
            .map(Command::Load)
            .map_err(|_| format!("'{id}' is not a palette id")),
        ("load" | "edit", _) => usage("load <id>"),
        ("delete", [id]) => id
            .parse()
            .map(Command::Delete)
            .map_err(|_| format!("'{id}' is not a palette id")),
        ("delete", _) => usage("delete <id>"),
        ("cancel", _) => Ok(Command::Cancel),
        ("rate", _) => Ok(Command::Rate),
        ("login", [e, p]) => Ok(Command::Login(e.to_string(), p.to_string())),
        ("login", _) => usage("login <email> <password>"),
        ("signup", [e, p]) => Ok(Command::Signup(e.to_string(), p.to_string())),
        ("signup", _) => usage("signup <email> <password>"),
        ("logout", _) => Ok(Command::Logout),
        (other, _) => Err(format!("unknown command '{other}' (try 'help')")),
    }
}

fn show_draft(studio: &mut Studio<JsonFileStore>) {
    let ed = studio.editor_mut();
    let editing = ed.draft().id;
    let name = ed.draft().name.clone();
    let view = PaletteView::Editable(ed);

    let labels = view.labels();
    for (i, label) in labels.iter().enumerate() {
        let marker = if view.shows_add_marker(i) { "+" } else { " " };
        let open = if view.active_picker() == Some(i) { "<" } else { "" };
        println!("  {}: {} {}{}", i + 1, label, marker, open);
    }
    println!("  name: {name:?}");
    if let Some(id) = editing {
        println!("  (editing {id})");
    }
}

pub fn run(cfg: &Config, accounts: Accounts) -> anyhow::Result<()> {
    let store = JsonFileStore::open(cfg.palettes_path())?;
    let mut studio = Studio::new(store, PaletteEditor::new(cfg.picker));
    let mut session = Session::new(accounts);

    // Held for the whole loop; dropping it at the end releases the handler.
    let _watch = session.on_session_change(|who| match who {
        Some(i) => println!("(signed in as {})", i.email),
        None => println!("(signed out)"),
    });

    println!("Palette editor. Type 'help' for commands, 'quit' to exit.");

    loop {
        print!("palette> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            // EOF (Ctrl+D)
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cmd = match parse_command(line) {
            Ok(c) => c,
            Err(msg) => {
                println!("{msg}");
                continue;
            }
        };

        let me = session.current().cloned();
        let outcome = match cmd {
            Command::Help => {
                print!("{HELP}");
                None
            }
            Command::Quit => break,
            Command::Show => {
                show_draft(&mut studio);
                None
            }
            Command::Feed => {
                for entry in studio.feed(me.as_ref()) {
                    print_palette(&entry.palette, entry.can_edit);
                }
                None
            }
            Command::Name(text) => {
                studio.editor_mut().set_name(text);
                None
            }
            Command::Hex(i, text) => {
                match studio.editor_mut().hex_input(i, &text) {
                    Some(c) => println!("slot {} = {c}", i + 1),
                    None => println!("(not a full color yet: {text:?})"),
                }
                None
            }
            Command::Pick(i) => {
                let state = studio.editor_mut().select_swatch(i);
                println!("picker: {state:?}");
                None
            }
            Command::Close => {
                studio.editor_mut().dismiss_picker();
                None
            }
            Command::Press(x, y) => {
                match studio.editor_mut().pointer_down(x, y) {
                    Some(c) => println!("-> {c}"),
                    None => println!("(no open picker under the pointer)"),
                }
                None
            }
            Command::Drag(x, y) => {
                if let Some(c) = studio.editor_mut().pointer_move(x, y) {
                    println!("-> {c}");
                }
                None
            }
            Command::Release => {
                studio.editor_mut().pointer_up();
                None
            }
            Command::Hue(h) => {
                if let Some(c) = studio.editor_mut().set_hue(h) {
                    println!("-> {c}");
                }
                None
            }
            Command::Save => Some(studio.submit(me.as_ref())),
            Command::Load(id) => Some(studio.begin_edit(me.as_ref(), id)),
            Command::Delete(id) => Some(studio.delete(me.as_ref(), id)),
            Command::Cancel => {
                studio.cancel_edit();
                None
            }
            Command::Rate => {
                let colors = studio.editor().draft().colors;
                let score = block_on_rating(cfg, &colors)?;
                println!("rating: {}/3", score.value());
                None
            }
            Command::Login(email, password) => {
                if let Err(e) = session.sign_in(&email, &password) {
                    println!("{e}");
                }
                None
            }
            Command::Signup(email, password) => {
                if let Err(e) = session.sign_up(&email, &password) {
                    println!("{e}");
                }
                None
            }
            Command::Logout => {
                session.sign_out();
                studio.signed_out();
                None
            }
        };

        match outcome {
            Some(Outcome::Created(id)) => println!("Saved palette {id}"),
            Some(Outcome::Updated(id)) => println!("Updated palette {id}"),
            Some(Outcome::Deleted(id)) => println!("Deleted palette {id}"),
            Some(Outcome::Editing(id)) => println!("Editing {id}"),
            Some(Outcome::Rejected(r)) => println!("(not saved: {r})"),
            Some(Outcome::Aborted(notice)) => {
                println!("!! {notice}");
                studio.dismiss_notice();
            }
            None => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_one_based() {
        assert_eq!(parse_command("pick 1"), Ok(Command::Pick(0)));
        assert_eq!(parse_command("pick 5"), Ok(Command::Pick(4)));
        assert!(parse_command("pick 0").is_err());
        assert!(parse_command("pick 6").is_err());
    }

    #[test]
    fn name_keeps_spaces() {
        assert_eq!(
            parse_command("name Late  Summer"),
            Ok(Command::Name("Late Summer".into()))
        );
    }

    #[test]
    fn pointer_commands_need_numbers() {
        assert_eq!(parse_command("press 75 160"), Ok(Command::Press(75.0, 160.0)));
        assert!(parse_command("press 75").is_err());
        assert!(parse_command("drag x 1").is_err());
    }

    #[test]
    fn hex_passes_text_through() {
        assert_eq!(
            parse_command("HEX 2 #ab"),
            Ok(Command::Hex(1, "#ab".into()))
        );
    }

    #[test]
    fn unknown_and_bad_ids() {
        assert!(parse_command("dance").is_err());
        assert!(parse_command("load nope").is_err());
    }
}
