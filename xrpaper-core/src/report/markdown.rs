//! Markdown rendering of an execution view.

use std::fmt::Write;

use super::format::{format_num, format_pct, format_price, format_timestamp, MISSING};
use crate::execution::mode_title;
use crate::journal::{DirectionView, ExecutionView};

fn direction_block(out: &mut String, view: &DirectionView) {
    let plan = &view.plan;
    let guidance = &view.guidance;

    let _ = writeln!(out, "### {}\n", guidance.title);
    for step in &guidance.steps {
        let _ = writeln!(out, "- {step}");
    }
    match plan.stop {
        Some(stop) => {
            let _ = writeln!(out, "- **Stop**: **{}**", format_num(Some(stop)));
        }
        None => {
            let _ = writeln!(out, "- **Stop**: {}", guidance.stop_hint);
        }
    }
    match plan.target1 {
        Some(t1) => {
            let _ = writeln!(
                out,
                "- **Alvo T1**: **{}** (R/R {})",
                format_num(Some(t1)),
                format_num(plan.risk_reward1)
            );
        }
        None => {
            let _ = writeln!(out, "- **Alvo T1**: {}", guidance.target_hint);
        }
    }
    if let Some(t2) = plan.target2 {
        let _ = writeln!(
            out,
            "- **Alvo T2**: **{}** ({}, R/R {})",
            format_num(Some(t2)),
            guidance.target2_note,
            format_num(plan.risk_reward2)
        );
    }
    out.push('\n');
}

/// Summary, signal, trigger checklist for the view's mode, and the frozen levels.
pub fn render_execution(view: &ExecutionView) -> String {
    let s = &view.snapshot;
    let symbol = s.symbol.as_deref().unwrap_or(MISSING);
    let timeframe = s
        .timeframe
        .map(|tf| tf.to_string())
        .unwrap_or_else(|| MISSING.to_string());
    let signal = s.signal.map(|m| m.label()).unwrap_or(MISSING);

    let mut out = format!(
        "# Execução — {symbol} {timeframe}\n\n\
**Sinal:** {signal}\n\n\
Snapshot `{}` salvo em {}.\n\n\
## Resumo\n\n\
| Campo | Valor |\n\
|-------|-------|\n\
| Símbolo | {symbol} |\n\
| Tempo Gráfico | {timeframe} |\n\
| Período | {} → {} |\n\
| Preço | {} |\n\
| ATR% | {} |\n\
| RSI K/D | {} / {} |\n\
| EMA20 | {} |\n\
| EMA200 | {} |\n\
| VWAP | {} |\n\
| Volume médio | {} |\n\n",
        s.id,
        format_timestamp(s.created_at),
        format_timestamp(s.date_from),
        format_timestamp(s.date_to),
        format_num(s.price_now),
        format_pct(s.atr_pct),
        format_num(s.rsi_k),
        format_num(s.rsi_d),
        format_num(s.ema20),
        format_num(s.ema200),
        format_num(s.vwap),
        format_num(s.vol_avg),
    );

    let _ = writeln!(
        out,
        "## Gatilhos simples ({}) — iniciante\n",
        mode_title(view.mode)
    );
    direction_block(&mut out, &view.long);
    direction_block(&mut out, &view.short);

    out.push_str("## Linhas HL do snapshot\n\n");
    if s.hl_rows.is_empty() {
        out.push_str("Nenhuma HL no snapshot.\n");
        return out;
    }
    out.push_str("| Preço | TF | Tipo | Data |\n");
    out.push_str("|-------|----|------|------|\n");
    for row in &s.hl_rows {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            format_price(Some(row.price)),
            row.timeframe.map(|tf| tf.to_string()).unwrap_or_else(|| MISSING.to_string()),
            row.level_type,
            format_timestamp(row.at),
        );
    }
    out
}
