pub fn render_index(title: Option<&str>) -> String {
    INDEX_HTML.replace("{{TITLE}}", &escape_html(title.unwrap_or("Check-in semanal")))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <style>
    :root {
      --bg: #f6f4ef;
      --ink: #2b2a28;
      --accent: #ff6b4a;
      --accent-2: #2f4858;
      --card: rgba(255, 255, 255, 0.92);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.18);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 24px 16px;
    }

    .checkin {
      width: min(560px, 100%);
      height: min(720px, calc(100vh - 48px));
      background: var(--card);
      border-radius: 24px;
      box-shadow: var(--shadow);
      display: grid;
      grid-template-rows: auto 1fr auto;
      overflow: hidden;
    }

    header {
      display: flex;
      align-items: center;
      justify-content: space-between;
      padding: 18px 22px;
      border-bottom: 1px solid rgba(47, 72, 88, 0.08);
    }

    header h1 {
      margin: 0;
      font-size: 1.2rem;
    }

    .messages {
      overflow-y: auto;
      padding: 18px 22px;
      display: flex;
      flex-direction: column;
      gap: 10px;
    }

    .message {
      max-width: 80%;
      padding: 10px 14px;
      border-radius: 16px;
      line-height: 1.4;
    }

    .message.bot {
      align-self: flex-start;
      background: #eef1f3;
    }

    .message.user {
      align-self: flex-end;
      background: var(--accent);
      color: white;
    }

    .options {
      display: flex;
      flex-wrap: wrap;
      gap: 8px;
    }

    .options button {
      border: 1px solid var(--accent-2);
      background: white;
      color: var(--accent-2);
      border-radius: 999px;
      padding: 8px 14px;
      cursor: pointer;
    }

    .options button:disabled {
      opacity: 0.4;
      cursor: not-allowed;
    }

    form {
      display: flex;
      gap: 8px;
      padding: 14px 22px 20px;
    }

    form input {
      flex: 1;
      border-radius: 999px;
      border: 1px solid rgba(47, 72, 88, 0.2);
      padding: 12px 16px;
      font-size: 1rem;
    }

    form button,
    .close {
      border: none;
      border-radius: 999px;
      padding: 12px 18px;
      background: var(--accent-2);
      color: white;
      cursor: pointer;
    }

    .close {
      padding: 8px 14px;
      background: transparent;
      color: var(--accent-2);
    }

    .banner {
      margin: 0 22px;
      padding: 10px 14px;
      border-radius: 12px;
      background: #fff4d6;
      display: none;
    }

    .banner[data-visible="true"] {
      display: block;
    }
  </style>
</head>
<body>
  <main class="checkin">
    <header>
      <h1>{{TITLE}}</h1>
      <button class="close" id="close" type="button">Fechar</button>
    </header>
    <section class="messages" id="messages"></section>
    <div>
      <p class="banner" id="banner"></p>
      <form id="composer">
        <input id="text" autocomplete="off" disabled />
        <button id="send" type="submit" disabled>Enviar</button>
      </form>
    </div>
  </main>
  <script>
    const messagesEl = document.getElementById('messages');
    const textEl = document.getElementById('text');
    const sendEl = document.getElementById('send');
    const bannerEl = document.getElementById('banner');
    const ANSWER_DELAY_MS = 500;

    const POLL_MS = 500;
    const COUNT_UP_MS = 1200;
    const pointsFormat = new Intl.NumberFormat('pt-BR');

    let view = null;
    let pollTimer = null;
    let celebrated = false;

    const scrollToEnd = () => {
      setTimeout(() => {
        messagesEl.scrollTop = messagesEl.scrollHeight;
      }, 50);
    };

    const appendMessage = (sender, text) => {
      const el = document.createElement('div');
      el.className = `message ${sender}`;
      el.textContent = text;
      messagesEl.appendChild(el);
      scrollToEnd();
    };

    const lockAnswers = () => {
      messagesEl.querySelectorAll('.options button').forEach((btn) => {
        btn.disabled = true;
      });
      textEl.disabled = true;
      sendEl.disabled = true;
    };

    const showBanner = (text) => {
      bannerEl.textContent = text;
      bannerEl.dataset.visible = text ? 'true' : 'false';
    };

    const pointsText = (points, total) => `Parabéns! Você ganhou ${points} pontos.`
      + (typeof total === 'number' ? ` Total: ${pointsFormat.format(total)} pontos.` : '');

    // Counts the banner total up from the previous balance.
    const animatePoints = (points, total) => {
      const from = Math.max(total - points, 0);
      const started = performance.now();
      const step = (now) => {
        if (!bannerEl.isConnected) {
          return;
        }
        const progress = Math.min((now - started) / COUNT_UP_MS, 1);
        showBanner(pointsText(points, Math.round(from + (total - from) * progress)));
        if (progress < 1) {
          requestAnimationFrame(step);
        }
      };
      requestAnimationFrame(step);
    };

    const celebrate = (submission) => {
      const points = submission.points_awarded;
      const total = submission.new_total_points;
      if (points <= 0) {
        showBanner('Check-in concluído!'
          + (typeof total === 'number' ? ` Total: ${pointsFormat.format(total)} pontos.` : ''));
      } else if (typeof total === 'number') {
        animatePoints(points, total);
      } else {
        showBanner(pointsText(points, total));
      }
    };

    const schedulePoll = () => {
      clearTimeout(pollTimer);
      pollTimer = setTimeout(async () => {
        try {
          const res = await fetch('/api/checkin');
          if (res.ok) {
            render(await res.json());
          }
        } catch (err) {
          console.error(err);
          schedulePoll();
        }
      }, POLL_MS);
    };

    const render = (next) => {
      view = next;
      messagesEl.innerHTML = '';
      next.messages.forEach((entry) => {
        if (entry.kind === 'message') {
          appendMessage(entry.sender, entry.text);
          return;
        }
        const row = document.createElement('div');
        row.className = 'options';
        entry.options.forEach((option) => {
          const btn = document.createElement('button');
          btn.type = 'button';
          btn.textContent = option;
          btn.disabled = !entry.enabled;
          btn.addEventListener('click', () => submitAnswer({ value: option }, option));
          row.appendChild(btn);
        });
        messagesEl.appendChild(row);
      });

      textEl.disabled = !next.input.enabled;
      sendEl.disabled = !next.input.enabled;
      textEl.placeholder = next.input.placeholder;
      textEl.value = '';

      const submission = next.submission;
      if (submission.state === 'accepted') {
        if (!celebrated) {
          celebrated = true;
          celebrate(submission);
        }
      } else if (submission.state === 'failed') {
        showBanner(submission.message);
      } else if (submission.state === 'in_flight') {
        showBanner('Enviando seu check-in...');
        schedulePoll();
      } else {
        showBanner('');
      }
      scrollToEnd();
    };

    const request = async (path, body) => {
      const res = await fetch(path, {
        method: 'POST',
        headers: body ? { 'Content-Type': 'application/json' } : {},
        body: body ? JSON.stringify(body) : undefined
      });
      if (!res.ok) {
        throw new Error(await res.text() || `Request failed (${res.status})`);
      }
      return res.status === 204 ? null : res.json();
    };

    const submitAnswer = async (answer, shown) => {
      if (!view || view.current_question === null) {
        return;
      }
      lockAnswers();
      appendMessage('user', shown);
      try {
        const next = await request('/api/checkin/answer', {
          question_id: view.current_question,
          ...answer
        });
        setTimeout(() => render(next), ANSWER_DELAY_MS);
      } catch (err) {
        showBanner(err.message);
      }
    };

    document.getElementById('composer').addEventListener('submit', (event) => {
      event.preventDefault();
      const text = textEl.value.trim();
      if (textEl.disabled || !text) {
        return;
      }
      submitAnswer({ text }, text);
    });

    document.getElementById('close').addEventListener('click', async () => {
      try {
        await request('/api/checkin/close');
      } catch (err) {
        console.error(err);
      }
      lockAnswers();
      showBanner('Seu progresso foi salvo. Volte quando quiser.');
    });

    request('/api/checkin/open')
      .then(render)
      .catch((err) => showBanner(err.message));
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_escaped() {
        let html = render_index(Some("<Semana & foco>"));
        assert!(html.contains("<title>&lt;Semana &amp; foco&gt;</title>"));
        assert!(!html.contains("{{TITLE}}"));
    }

    #[test]
    fn points_count_up_stops_once_banner_is_gone() {
        let html = render_index(None);
        assert!(html.contains("requestAnimationFrame(step)"));
        assert!(html.contains("if (!bannerEl.isConnected)"));
        assert!(html.contains("fetch('/api/checkin')"));
    }
}
