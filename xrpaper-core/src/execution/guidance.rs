//! Trigger checklists per mode and direction.
//!
//! This is the only output that differs between breakout and pullback.

use serde::Serialize;

use super::planner::{Direction, Mode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Guidance {
    pub title: &'static str,
    pub steps: Vec<&'static str>,
    /// Shown instead of a number when no stop could be derived.
    pub stop_hint: &'static str,
    /// Shown instead of a number when no first target could be derived.
    pub target_hint: &'static str,
    /// Suffix after the second target.
    pub target2_note: &'static str,
}

pub fn mode_title(mode: Mode) -> &'static str {
    match mode {
        Mode::Breakout => "Rompimento",
        Mode::Pullback => "Pullback",
    }
}

pub fn guidance(direction: Direction, mode: Mode) -> Guidance {
    match (mode, direction) {
        (Mode::Breakout, Direction::Long) => Guidance {
            title: "Long (Compra por rompimento)",
            steps: vec![
                "Espere um candle fechar acima da EMA20.",
                "O RSI K deve estar acima do D (cruzamento para cima).",
                "O ATR% precisa aumentar.",
            ],
            stop_hint: "abaixo da EMA20 ou do suporte mais próximo",
            target_hint: "na resistência mais próxima",
            target2_note: "resistência seguinte",
        },
        (Mode::Breakout, Direction::Short) => Guidance {
            title: "Short (Venda por rompimento)",
            steps: vec![
                "Espere um candle fechar abaixo da EMA200.",
                "O RSI K deve estar abaixo do D (cruzamento para baixo).",
                "O ATR% precisa aumentar.",
            ],
            stop_hint: "acima da EMA200 ou da resistência mais próxima",
            target_hint: "no suporte mais próximo",
            target2_note: "suporte seguinte",
        },
        (Mode::Pullback, Direction::Long) => Guidance {
            title: "Long (Compra por pullback)",
            steps: vec![
                "Primeiro, o preço já deve estar acima da EMA20.",
                "Espere um recuo até a EMA20 ou até o suporte mais próximo.",
                "Entre quando o RSI K cruzar acima do D novamente.",
            ],
            stop_hint: "logo abaixo da EMA20 ou do suporte testado",
            target_hint: "na resistência mais próxima",
            target2_note: "resistência seguinte",
        },
        (Mode::Pullback, Direction::Short) => Guidance {
            title: "Short (Venda por pullback)",
            steps: vec![
                "O preço já deve estar abaixo da EMA200.",
                "Espere um repique até a resistência mais próxima ou até a EMA200.",
                "Entre quando o RSI K cruzar abaixo do D novamente.",
            ],
            stop_hint: "logo acima da EMA200 ou da resistência testada",
            target_hint: "no suporte mais próximo",
            target2_note: "suporte seguinte",
        },
    }
}
