use async_trait::async_trait;
use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;
use crate::models::Notification;
use crate::plugins::traits::{NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    currency_symbol: String,
}

impl EmailNotifier {
    /// `None` unless an SMTP host, sender and recipient are configured.
    pub fn from_config(config: &EmailConfig, currency_symbol: &str) -> Result<Option<Self>> {
        let (Some(host), Some(from_address), Some(to_address)) =
            (&config.smtp_host, &config.from_address, &config.to_address)
        else {
            return Ok(None);
        };

        let from_name = config.from_name.as_deref().unwrap_or("Restock Watcher");
        let from = format!("{} <{}>", from_name, from_address)
            .parse::<Mailbox>()
            .map_err(|e| email_error(format!("Invalid from address: {}", e)))?;
        let to = to_address
            .parse::<Mailbox>()
            .map_err(|e| email_error(format!("Invalid to address: {}", e)))?;

        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| email_error(format!("Invalid SMTP relay {}: {}", host, e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        if let Some(port) = config.smtp_port {
            builder = builder.port(port);
        }
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Some(EmailNotifier {
            mailer: builder.build(),
            from,
            to,
            currency_symbol: currency_symbol.to_string(),
        }))
    }

    fn format_subject(&self, notification: &Notification) -> String {
        format!(
            "{} {}: {} - {}",
            notification.kind.emoji(),
            notification.kind.headline(),
            notification.record.name,
            notification.formatted_price(&self.currency_symbol)
        )
    }

    fn format_html_body(&self, notification: &Notification) -> String {
        let record = &notification.record;
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        .header {{ background: #f0f0f0; padding: 15px; border-radius: 5px; }}
        .product {{ font-size: 18px; font-weight: bold; }}
        .button {{ display: inline-block; padding: 10px 20px; background: #007bff; color: white; text-decoration: none; border-radius: 5px; }}
    </style>
</head>
<body>
    <div class="header">
        <h2>{} {}</h2>
        <div class="product">{}</div>
    </div>
    <p><strong>Price:</strong> {}</p>
    <p><strong>Previously:</strong> {}</p>
    <p><strong>Detected:</strong> {}</p>
    <p><a href="{}" class="button">Buy Now</a></p>
</body>
</html>"#,
            notification.kind.emoji(),
            notification.kind.headline(),
            html_escape(&record.name),
            notification.formatted_price(&self.currency_symbol),
            notification.previous_state,
            record.state_entered_at.format("%Y-%m-%d %H:%M:%S UTC"),
            html_escape(&record.url),
        )
    }

    fn format_text_body(&self, notification: &Notification) -> String {
        let record = &notification.record;
        format!(
            "{}\n\nProduct: {}\nPrice: {}\nPreviously: {}\nDetected: {}\n\nBuy Now: {}\n",
            notification.kind.headline(),
            record.name,
            notification.formatted_price(&self.currency_symbol),
            notification.previous_state,
            record.state_entered_at.format("%Y-%m-%d %H:%M:%S UTC"),
            record.url,
        )
    }

    fn build_message(&self, notification: &Notification) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(self.format_subject(notification))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(self.format_text_body(notification)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(self.format_html_body(notification)),
                    ),
            )
            .map_err(|e| email_error(format!("Failed to build message: {}", e)))
    }
}

fn email_error(message: String) -> AppError {
    AppError::Plugin {
        plugin_type: "email".to_string(),
        message,
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl NotifierPlugin for EmailNotifier {
    fn name(&self) -> &str {
        "Email Notifier"
    }

    fn plugin_type(&self) -> &str {
        "email"
    }

    fn description(&self) -> &str {
        "Sends HTML email notifications via SMTP"
    }

    async fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        let email = self.build_message(notification)?;

        match self.mailer.send(email).await {
            Ok(response) => Ok(NotificationResult::delivered(
                response.message().next().map(str::to_string),
            )),
            Err(e) => Ok(NotificationResult::failed(e.to_string())),
        }
    }
}
