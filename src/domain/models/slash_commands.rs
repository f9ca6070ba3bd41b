#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

pub struct SlashCommand {
    command: String,
    pub args: Vec<String>,
    rest: String,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let trimmed = text.trim();
        let (prefix, rest) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
        let args = rest
            .split(' ')
            .filter(|e| return !e.is_empty())
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();

        let cmd = SlashCommand {
            command: prefix.to_string(),
            args,
            rest: rest.trim().to_string(),
        };
        if cmd.is_quit()
            || cmd.is_help()
            || cmd.is_new()
            || cmd.is_sessions()
            || cmd.is_switch()
            || cmd.is_delete()
            || cmd.is_rename()
            || cmd.is_edit()
            || cmd.is_regenerate()
            || cmd.is_model_list()
            || cmd.is_model_set()
            || cmd.is_system()
            || cmd.is_stream_toggle()
            || cmd.is_attach()
            || cmd.is_detach()
            || cmd.is_theme_toggle()
        {
            return Some(cmd);
        }

        return None;
    }

    /// Everything after the command, untouched apart from surrounding
    /// whitespace.
    pub fn rest(&self) -> &str {
        return &self.rest;
    }

    /// Parses the first argument as a one based index and returns the rest of
    /// the line after it.
    pub fn index_and_text(&self) -> Option<(usize, String)> {
        let (first, text) = self.rest.split_once(' ').unwrap_or((&self.rest, ""));
        let idx = first.parse::<usize>().ok()?;
        if idx < 1 {
            return None;
        }

        return Some((idx - 1, text.trim().to_string()));
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }

    pub fn is_new(&self) -> bool {
        return ["/n", "/new"].contains(&self.command.as_str());
    }

    pub fn is_sessions(&self) -> bool {
        return ["/ls", "/sessions"].contains(&self.command.as_str());
    }

    pub fn is_switch(&self) -> bool {
        return ["/s", "/switch"].contains(&self.command.as_str());
    }

    pub fn is_delete(&self) -> bool {
        return ["/d", "/delete"].contains(&self.command.as_str());
    }

    pub fn is_rename(&self) -> bool {
        return ["/rename"].contains(&self.command.as_str()) && !self.rest.is_empty();
    }

    pub fn is_edit(&self) -> bool {
        return ["/e", "/edit"].contains(&self.command.as_str());
    }

    pub fn is_regenerate(&self) -> bool {
        return ["/r", "/regen", "/regenerate"].contains(&self.command.as_str());
    }

    pub fn is_model_list(&self) -> bool {
        return ["/ml", "/models", "/modellist"].contains(&self.command.as_str());
    }

    pub fn is_model_set(&self) -> bool {
        return ["/m", "/model"].contains(&self.command.as_str());
    }

    pub fn is_system(&self) -> bool {
        return ["/system"].contains(&self.command.as_str());
    }

    pub fn is_stream_toggle(&self) -> bool {
        return ["/stream"].contains(&self.command.as_str());
    }

    pub fn is_attach(&self) -> bool {
        return ["/a", "/attach"].contains(&self.command.as_str()) && !self.rest.is_empty();
    }

    pub fn is_detach(&self) -> bool {
        return ["/detach"].contains(&self.command.as_str());
    }

    pub fn is_theme_toggle(&self) -> bool {
        return ["/theme"].contains(&self.command.as_str());
    }
}
