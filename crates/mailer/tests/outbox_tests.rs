use feza_mailer::{LogMailer, MailError, MailMessage, Mailbox, Mailer, OutboxMailer};
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn message() -> TestResult<MailMessage> {
    Ok(MailMessage::new(
        Mailbox::new(Some("Feza Logistics".into()), "no-reply@fezalogistics.com")?,
        "Your login code",
    )
    .to(Mailbox::new(None, "staff@fezalogistics.com")?)
    .text("Your code is 123456"))
}

#[tokio::test]
async fn outbox_mailer_writes_eml_file() -> TestResult {
    let temp_dir = TempDir::new()?;
    let outbox = temp_dir.path().join("spool");
    let mailer = OutboxMailer::new(&outbox);

    let message = message()?;
    let receipt = mailer.send(&message).await?;

    assert_eq!(receipt.message_id, message.message_id);
    let location = receipt.location.ok_or("outbox location missing")?;
    assert!(location.ends_with(".eml"));

    let contents = std::fs::read_to_string(&location)?;
    assert!(contents.contains("Subject: Your login code"));
    assert!(contents.contains("To: <staff@fezalogistics.com>"));
    assert_eq!(std::fs::read_dir(&outbox)?.count(), 1);
    Ok(())
}

#[tokio::test]
async fn mailers_refuse_messages_without_recipients() -> TestResult {
    let temp_dir = TempDir::new()?;
    let message = MailMessage::new(Mailbox::new(None, "a@example.com")?, "subject").text("body");

    let outbox = OutboxMailer::new(temp_dir.path());
    assert!(matches!(
        outbox.send(&message).await,
        Err(MailError::NoRecipients)
    ));
    assert!(matches!(
        LogMailer.send(&message).await,
        Err(MailError::NoRecipients)
    ));
    Ok(())
}

#[tokio::test]
async fn log_mailer_reports_no_location() -> TestResult {
    let receipt = LogMailer.send(&message()?).await?;
    assert!(receipt.location.is_none());
    Ok(())
}
