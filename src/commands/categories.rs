use crate::api::Mode;
use crate::categories::{CategoryOutcome, CategorySet};
use crate::commands::{open_pipeline, Out};
use crate::model::Kind;
use crate::{Config, Result};
use anyhow::bail;

/// Lists category labels for `kind`, or for every kind. With `remote`, the backend is asked first
/// and the local labels are used for any kind it has nothing for.
pub async fn list_categories(
    config: &Config,
    mode: Mode,
    kind: Option<Kind>,
    remote: bool,
) -> Result<Out<CategorySet>> {
    let mut pipeline = open_pipeline(config, mode).await?;
    let mut set = pipeline.load_categories().await?;
    if remote {
        for k in Kind::ALL {
            let labels = pipeline
                .gateway()
                .remote_categories(pipeline.session(), pipeline.store(), k)
                .await;
            match k {
                Kind::Expense => set.expense = labels,
                Kind::Income => set.income = labels,
                Kind::Salary => set.salary = labels,
            }
        }
    }
    let message = match kind {
        Some(k) => format!("{k}: {}", set.get(k).join(", ")),
        None => Kind::ALL
            .iter()
            .map(|k| format!("{k}: {}", set.get(*k).join(", ")))
            .collect::<Vec<_>>()
            .join("\n"),
    };
    Ok(Out::new(message, set))
}

/// Adds `label` to `kind`'s local categories.
///
/// # Errors
/// - Returns an error when the label is a duplicate or blank, or when the cache cannot be written.
pub async fn add_category(
    config: &Config,
    mode: Mode,
    kind: Kind,
    label: &str,
) -> Result<Out<CategoryOutcome>> {
    let mut pipeline = open_pipeline(config, mode).await?;
    let outcome = pipeline.add_category(kind, label).await?;
    if !outcome.success {
        bail!("{}", outcome.message);
    }
    Ok(Out::new(format!("{} ({kind}: {label})", outcome.message), outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::DUPLICATE_MESSAGE;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_add_persists_between_commands() {
        let env = TestEnv::new().await;
        let config = env.config();
        add_category(&config, Mode::Testing, Kind::Expense, "Pets")
            .await
            .unwrap();
        let out = list_categories(&config, Mode::Testing, Some(Kind::Expense), false)
            .await
            .unwrap();
        assert_eq!(
            out.structure().unwrap().expense.last().map(String::as_str),
            Some("Pets")
        );
        assert!(out.message().ends_with("Pets"));

        let err = add_category(&config, Mode::Testing, Kind::Expense, "Pets")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), DUPLICATE_MESSAGE);
    }

    #[tokio::test]
    async fn test_remote_falls_back_to_local() {
        let env = TestEnv::new().await.logged_in().await;
        let out = list_categories(&env.config(), Mode::Testing, None, true)
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap(), &CategorySet::defaults());
    }
}
