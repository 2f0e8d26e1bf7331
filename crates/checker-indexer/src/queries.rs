//! GraphQL documents sent to the indexer.

pub const ROUND_WITH_APPLICATIONS: &str = r#"
query RoundApplications($chainId: Int!, $roundId: String!) {
  rounds(filter: { chainId: { equalTo: $chainId }, id: { equalTo: $roundId } }) {
    chainId
    id
    roundMetadata
    roundMetadataCid
    applications {
      id
      metadata
      metadataCid
      status
      projectId
      project: canonicalProject {
        metadata
        metadataCid
      }
    }
  }
}
"#;

pub const APPLICATION_WITH_ROUND: &str = r#"
query ApplicationWithRound($chainId: Int!, $roundId: String!, $applicationId: String!) {
  applications(
    first: 1
    filter: {
      chainId: { equalTo: $chainId }
      roundId: { equalTo: $roundId }
      id: { equalTo: $applicationId }
    }
  ) {
    id
    chainId
    metadata
    metadataCid
    status
    projectId
    project: canonicalProject {
      metadata
      metadataCid
    }
    round {
      id
      roundMetadata
    }
  }
}
"#;

pub const ROUND_MANAGERS: &str = r#"
query RoundManager($chainId: Int!, $alloPoolId: String!) {
  rounds(filter: { chainId: { equalTo: $chainId }, id: { equalTo: $alloPoolId } }) {
    roles {
      address
    }
  }
}
"#;
